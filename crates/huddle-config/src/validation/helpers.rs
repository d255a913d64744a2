//! Shared range-validation helpers.

/// Push an error if `value` is outside `[min, max]`.
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error if `value` is empty or longer than `max_len` characters.
pub(crate) fn validate_name(errors: &mut Vec<String>, name: &str, value: &str, max_len: usize) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.push(format!("{name} must not be empty"));
    } else if len > max_len {
        errors.push(format!("{name} is longer than {max_len} characters"));
    }
}
