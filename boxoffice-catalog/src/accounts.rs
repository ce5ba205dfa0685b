use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::{CreateUserRequest, UpdateUserRequest, User};

fn clean_name(name: &str) -> CoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::InvalidInput("user name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

/// Trimmed and lowercased; must look like `local@domain`.
fn clean_email(email: &str) -> CoreResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    };
    if !valid {
        return Err(CoreError::InvalidInput(format!("invalid email address: {}", email)));
    }
    Ok(email)
}

pub fn new_user(req: CreateUserRequest) -> CoreResult<User> {
    Ok(User::new(clean_name(&req.name)?, clean_email(&req.email)?))
}

pub fn revise_user(mut user: User, update: UpdateUserRequest) -> CoreResult<User> {
    let update = UpdateUserRequest {
        name: update.name.as_deref().map(clean_name).transpose()?,
        email: update.email.as_deref().map(clean_email).transpose()?,
    };
    user.apply(update);
    Ok(user)
}
