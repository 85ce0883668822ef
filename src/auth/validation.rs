//! 注册表单校验规则

/// 用户名最大长度
const USERNAME_MAX_LEN: usize = 150;
/// 密码最小长度
const PASSWORD_MIN_LEN: usize = 8;

pub const FIELD_REQUIRED: &str = "This field is required.";

/// 用户名只允许字母、数字和 @ . + - _
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.is_empty() {
        return Err(FIELD_REQUIRED);
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err("Ensure this field has no more than 150 characters.");
    }
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.is_empty() {
        return Err(FIELD_REQUIRED);
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err("Enter a valid email address.")
    }
}

/// 密码强度：长度、不能全是数字、不能与用户名相同
pub fn validate_password(password: &str, username: &str) -> Result<(), &'static str> {
    if password.is_empty() {
        return Err(FIELD_REQUIRED);
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err("This password is too short. It must contain at least 8 characters.");
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.");
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        return Err("The password is too similar to the username.");
    }
    Ok(())
}
