use boxoffice_core::{CoreError, CoreResult};
use rust_decimal::Decimal;

/// Amounts are stored as NUMERIC(12, 2): whole cents up to 9_999_999_999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);
pub const AMOUNT_SCALE: u32 = 2;

/// Reject amounts the store cannot hold exactly.
pub fn check_amount(field: &str, amount: Decimal) -> CoreResult<()> {
    if amount < Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "{} must not be negative, got {}",
            field, amount
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(CoreError::InvalidInput(format!(
            "{} must have at most {} decimal places, got {}",
            field, AMOUNT_SCALE, amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(CoreError::InvalidInput(format!(
            "{} must not exceed {}, got {}",
            field, MAX_AMOUNT, amount
        )));
    }
    Ok(())
}

/// Price of `quantity` tickets at `ticket_price`, frozen onto the booking.
pub fn quote(quantity: i32, ticket_price: Decimal) -> CoreResult<Decimal> {
    if quantity < 1 {
        return Err(CoreError::InvalidInput(format!(
            "quantity must be at least 1, got {}",
            quantity
        )));
    }
    check_amount("ticket price", ticket_price)?;

    let total = ticket_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| CoreError::InvalidInput("total amount overflows".to_string()))?;
    check_amount("total amount", total)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_multiplies_price() {
        let price = Decimal::new(2000, 2); // 20.00
        assert_eq!(quote(3, price).unwrap(), Decimal::new(60, 0));
        assert_eq!(quote(1, Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_quote_rejects_bad_input() {
        assert!(matches!(quote(0, Decimal::ONE), Err(CoreError::InvalidInput(_))));
        assert!(matches!(quote(-2, Decimal::ONE), Err(CoreError::InvalidInput(_))));
        assert!(matches!(quote(1, Decimal::NEGATIVE_ONE), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_quote_reports_overflow() {
        assert!(matches!(quote(i32::MAX, Decimal::MAX), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_max_amount_is_twelve_digits() {
        assert_eq!(MAX_AMOUNT, Decimal::new(999_999_999_999, 2));
        assert!(check_amount("price", MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_total_must_fit_storage() {
        let price = Decimal::new(999_999_999, 0);
        assert!(quote(10, price).is_ok());
        assert!(matches!(quote(20, price), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_amounts_are_whole_cents() {
        assert!(check_amount("price", Decimal::new(1250, 2)).is_ok());
        assert!(check_amount("price", Decimal::new(12500, 3)).is_ok());
        assert!(matches!(
            check_amount("price", Decimal::new(12505, 3)),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            check_amount("price", Decimal::new(100_000_000_000, 0)),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
