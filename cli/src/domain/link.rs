//! Link template rendering and random identifier draws.

use std::ops::RangeInclusive;

use rand::Rng;

/// Placeholder substituted with the drawn identifier.
pub const LINK_ID_PLACEHOLDER: &str = "{userId}";

/// Whether a link template carries the identifier placeholder.
#[must_use]
pub fn has_placeholder(template: &str) -> bool {
    template.contains(LINK_ID_PLACEHOLDER)
}

/// Substitute `id` for every placeholder in `template`.
#[must_use]
pub fn render(template: &str, id: u32) -> String {
    template.replace(LINK_ID_PLACEHOLDER, &id.to_string())
}

/// Draw an identifier uniformly from `range`.
///
/// An inverted range yields its start.
#[must_use]
pub fn draw_id(range: &RangeInclusive<u32>) -> u32 {
    if range.is_empty() {
        return *range.start();
    }
    rand::thread_rng().gen_range(range.clone())
}
