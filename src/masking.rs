//! Email masking for public-facing payloads.

/// Mask an email address for display to non-admin callers,
/// `ab***@do***.com` style. Values without an `@` pass through.
pub fn mask_email(email: &str) -> String {
    let Some((user, domain)) = email.split_once('@') else {
        return email.to_string();
    };

    fn mask_part(s: &str) -> String {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() <= 2 {
            let head: String = chars.iter().take(1).collect();
            format!("{}*", head)
        } else {
            let head: String = chars.iter().take(2).collect();
            format!("{}***", head)
        }
    }

    let mut dom_parts: Vec<String> = domain.split('.').map(|p| p.to_string()).collect();
    if let Some(first) = dom_parts.first_mut() {
        *first = mask_part(first);
    }
    format!("{}@{}", mask_part(user), dom_parts.join("."))
}
