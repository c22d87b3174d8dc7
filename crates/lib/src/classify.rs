//! Normalize loose item type labels into the media kinds the forwarder dispatches on.

/// Semantic kind of an inbound item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MediaKind {
    #[default]
    Image,
    Video,
    Carousel,
}

/// Case-insensitive; reels are videos, albums and sidecars are carousels, anything else is an image.
pub fn classify(label: Option<&str>) -> MediaKind {
    let Some(label) = label else {
        return MediaKind::Image;
    };
    match label.to_lowercase().as_str() {
        "reel" => MediaKind::Video,
        "carousel" | "album" | "sidecar" => MediaKind::Carousel,
        "video" => MediaKind::Video,
        _ => MediaKind::Image,
    }
}
