use std::num::IntErrorKind;

use super::{FeedPage, Gallery, PhotoListResponse};

/// Where a requested page number lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelection {
    Page(usize),
    /// Outside the feed; only reported to programmatic callers.
    OutOfRange,
}

/// Page count for `total` items, at least 1 even for an empty feed.
pub fn num_pages(total: usize, per_page: usize) -> usize {
    total.div_ceil(per_page.max(1)).max(1)
}

/// Resolve the raw `page` query value. Missing or non-numeric values go to
/// page 1; out-of-range numbers go to the last page for browsers.
pub fn resolve_page(
    requested: Option<&str>,
    total: usize,
    per_page: usize,
    programmatic: bool,
) -> PageSelection {
    let last = num_pages(total, per_page);

    let in_range = match requested.map(str::trim) {
        None => Some(1),
        Some(raw) => match raw.parse::<i64>() {
            Ok(number) if number >= 1 && number as u64 <= last as u64 => Some(number as usize),
            Ok(_) => None,
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                None
            }
            Err(_) => Some(1),
        },
    };

    match in_range {
        Some(number) => PageSelection::Page(number),
        None if programmatic => PageSelection::OutOfRange,
        None => PageSelection::Page(last),
    }
}

impl Gallery {
    /// Resolve a page request against the current photo count. `None` means
    /// the programmatic caller asked for a page outside the feed.
    pub async fn feed(&self, requested: Option<&str>, programmatic: bool) -> Option<FeedPage> {
        let total = self.repository.count().await;
        match resolve_page(requested, total, self.config.photos_per_page, programmatic) {
            PageSelection::Page(number) => Some(self.feed_page(number).await),
            PageSelection::OutOfRange => None,
        }
    }

    /// One page of the newest-first feed. `number` is clamped into range.
    pub async fn feed_page(&self, number: usize) -> FeedPage {
        let per_page = self.config.photos_per_page.max(1);
        let total = self.repository.count().await;
        let last = num_pages(total, per_page);
        let number = number.clamp(1, last);

        let photos = self
            .repository
            .newest_first((number - 1) * per_page, per_page)
            .await;

        FeedPage {
            photos,
            number,
            num_pages: last,
            has_next: number < last,
            has_previous: number > 1,
        }
    }

    /// Every photo, newest first, with ids.
    pub async fn all_photos(&self) -> PhotoListResponse {
        let photos = self
            .repository
            .all_newest_first()
            .await
            .iter()
            .map(|photo| self.feed_item(photo, true))
            .collect();

        PhotoListResponse { photos }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::open_gallery;
    use super::super::NewPhoto;
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_num_pages_is_at_least_one() {
        assert_eq!(num_pages(0, 12), 1);
        assert_eq!(num_pages(12, 12), 1);
        assert_eq!(num_pages(13, 12), 2);
        assert_eq!(num_pages(5, 0), 5);
    }

    #[test]
    fn test_resolve_page() {
        assert_eq!(resolve_page(None, 30, 12, false), PageSelection::Page(1));
        assert_eq!(resolve_page(Some("2"), 30, 12, false), PageSelection::Page(2));
        assert_eq!(resolve_page(Some("abc"), 30, 12, true), PageSelection::Page(1));
        assert_eq!(resolve_page(Some(""), 30, 12, true), PageSelection::Page(1));
        assert_eq!(resolve_page(Some("1.5"), 30, 12, true), PageSelection::Page(1));
    }

    #[test]
    fn test_out_of_range_depends_on_caller() {
        assert_eq!(resolve_page(Some("999"), 5, 12, true), PageSelection::OutOfRange);
        assert_eq!(resolve_page(Some("999"), 5, 12, false), PageSelection::Page(1));
        assert_eq!(resolve_page(Some("0"), 30, 12, true), PageSelection::OutOfRange);
        assert_eq!(resolve_page(Some("-3"), 30, 12, false), PageSelection::Page(3));
        assert_eq!(
            resolve_page(Some("99999999999999999999"), 30, 12, true),
            PageSelection::OutOfRange
        );
    }

    #[tokio::test]
    async fn test_feed_pages_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let gallery = open_gallery(&temp_dir).await;
        let start = Utc::now();

        for i in 0..13 {
            gallery
                .repository()
                .insert(NewPhoto::new(
                    format!("photos/2024/01/01/p{}.jpg", i),
                    start + Duration::seconds(i),
                ))
                .await
                .unwrap();
        }

        let first = gallery.feed(None, false).await.unwrap();
        assert_eq!(first.photos.len(), 12);
        assert_eq!(first.num_pages, 2);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert!(first.photos[0].image.ends_with("p12.jpg"));

        let last = gallery.feed(Some("999"), false).await.unwrap();
        assert_eq!(last.number, 2);
        assert_eq!(last.photos.len(), 1);
        assert!(last.photos[0].image.ends_with("p0.jpg"));
        assert!(!last.has_next);

        assert!(gallery.feed(Some("999"), true).await.is_none());
    }

    #[tokio::test]
    async fn test_all_photos_carries_ids_and_fallback_urls() {
        let temp_dir = TempDir::new().unwrap();
        let gallery = open_gallery(&temp_dir).await;
        let now = Utc::now();

        let older = gallery
            .repository()
            .insert(NewPhoto::new("photos/a.jpg".to_string(), now))
            .await
            .unwrap();
        let newer = gallery
            .repository()
            .insert(NewPhoto::new("photos/b.jpg".to_string(), now))
            .await
            .unwrap();
        gallery
            .repository()
            .update(older.id, |p| {
                p.thumbnail = Some("thumbnails/a_thumb.webp".to_string());
                p.title = "Sunset".to_string();
            })
            .await
            .unwrap();

        let list = gallery.all_photos().await;
        assert_eq!(list.photos.len(), 2);

        // Same timestamp: higher id first
        assert_eq!(list.photos[0].id, Some(newer.id));
        assert_eq!(list.photos[0].url, "/media/photos/b.jpg");
        assert_eq!(list.photos[0].full_url, "/media/photos/b.jpg");
        assert_eq!(list.photos[0].title, "b.jpg");

        assert_eq!(list.photos[1].url, "/media/thumbnails/a_thumb.webp");
        assert_eq!(list.photos[1].full_url, "/media/photos/a.jpg");
        assert_eq!(list.photos[1].title, "Sunset");
    }
}
