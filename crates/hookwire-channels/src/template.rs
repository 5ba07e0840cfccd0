//! Placeholder templating — `{{field}}` markers resolved from a
//! delivery payload, case-insensitively. Unknown placeholders render
//! as empty strings rather than erroring a delivery.

use hookwire_core::DeliveryPayload;

/// Render `{{field}}` placeholders in a template against a payload.
pub fn render(template: &str, payload: &DeliveryPayload) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                out.push_str(&payload.field(name));
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated marker: emit literally.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
