//! WhatsApp address normalization for contacts and groups.

use crate::error::GatewayError;

/// Server suffix for personal (contact) addresses.
pub const CONTACT_SUFFIX: &str = "@s.whatsapp.net";

/// Server suffix for group addresses.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Normalize a phone number into a contact address.
///
/// Strips every non-digit character and appends [`CONTACT_SUFFIX`].
/// An input that already carries the suffix is returned unchanged.
pub fn contact_jid(phone: &str) -> Result<String, GatewayError> {
    let phone = phone.trim();
    if phone.ends_with(CONTACT_SUFFIX) {
        return Ok(phone.to_string());
    }

    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(GatewayError::Validation(format!(
            "phone '{phone}' contains no digits"
        )));
    }
    Ok(format!("{digits}{CONTACT_SUFFIX}"))
}

/// Normalize a group identifier into a group address.
pub fn group_jid(group: &str) -> String {
    let group = group.trim();
    if group.ends_with(GROUP_SUFFIX) {
        group.to_string()
    } else {
        format!("{group}{GROUP_SUFFIX}")
    }
}
