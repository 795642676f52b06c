use serde::Serialize;

use crate::models::Vehicle;

/// Currently selected image over a vehicle's gallery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GalleryNavigator {
    selected: Option<String>,
    gallery: Vec<String>,
}

impl GalleryNavigator {
    pub fn new(selected: Option<String>, gallery: Vec<String>) -> Self {
        Self { selected, gallery }
    }

    /// Starts on the main image
    pub fn for_vehicle(vehicle: &Vehicle) -> Self {
        Self::new(vehicle.main_image.clone(), vehicle.image_gallery.clone())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn gallery(&self) -> &[String] {
        &self.gallery
    }

    /// Arrows are only worth drawing with more than one image
    pub fn shows_controls(&self) -> bool {
        self.gallery.len() > 1
    }

    /// Selects `image` even when it is not part of the gallery
    pub fn select(&mut self, image: impl Into<String>) {
        self.selected = Some(image.into());
    }

    pub fn next(&mut self) {
        if let Some(index) = self.position() {
            let next = if index + 1 == self.gallery.len() { 0 } else { index + 1 };
            self.selected = Some(self.gallery[next].clone());
        }
    }

    pub fn previous(&mut self) {
        if let Some(index) = self.position() {
            let prev = if index == 0 { self.gallery.len() - 1 } else { index - 1 };
            self.selected = Some(self.gallery[prev].clone());
        }
    }

    // None when the selection is not in the gallery, which makes next/previous no-ops
    fn position(&self) -> Option<usize> {
        let selected = self.selected.as_deref()?;
        self.gallery.iter().position(|img| img == selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav(selected: &str, gallery: &[&str]) -> GalleryNavigator {
        GalleryNavigator::new(
            Some(selected.to_string()),
            gallery.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn next_and_previous_wrap_around() {
        let mut g = nav("c.jpg", &["a.jpg", "b.jpg", "c.jpg"]);
        g.next();
        assert_eq!(g.selected(), Some("a.jpg"));
        g.previous();
        assert_eq!(g.selected(), Some("c.jpg"));
        g.previous();
        assert_eq!(g.selected(), Some("b.jpg"));
    }

    #[test]
    fn next_then_previous_is_a_round_trip() {
        let gallery = ["a.jpg", "b.jpg", "c.jpg", "d.jpg"];
        for start in gallery {
            let mut g = nav(start, &gallery);
            g.next();
            g.previous();
            assert_eq!(g.selected(), Some(start));
        }
    }

    #[test]
    fn single_image_wraps_to_itself() {
        let mut g = nav("only.jpg", &["only.jpg"]);
        assert!(!g.shows_controls());
        g.next();
        assert_eq!(g.selected(), Some("only.jpg"));
        g.previous();
        assert_eq!(g.selected(), Some("only.jpg"));
    }

    #[test]
    fn selection_outside_gallery_blocks_navigation() {
        let mut g = nav("a.jpg", &["a.jpg", "b.jpg"]);
        g.select("elsewhere.jpg");
        assert_eq!(g.selected(), Some("elsewhere.jpg"));
        g.next();
        assert_eq!(g.selected(), Some("elsewhere.jpg"));

        let mut empty = GalleryNavigator::default();
        empty.next();
        empty.previous();
        assert_eq!(empty.selected(), None);
    }
}
