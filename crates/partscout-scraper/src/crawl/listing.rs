use std::collections::HashSet;

use rand::seq::SliceRandom;

use super::CrawlOrchestrator;
use crate::extract::Extractor;
use crate::session::FetchContext;

pub(super) struct ListingWalk {
    pub(super) urls: Vec<String>,
    pub(super) pages: usize,
    pub(super) first_page_failed: bool,
    pub(super) cancelled: bool,
}

/// Drops repeated URLs, keeping the first occurrence of each.
#[must_use]
pub fn dedupe_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// Dedupes discovered URLs, then shuffles them when `randomize` is set.
#[must_use]
pub fn collect_urls(urls: Vec<String>, randomize: bool) -> Vec<String> {
    let mut urls = dedupe_urls(urls);
    if randomize {
        urls.shuffle(&mut rand::rng());
    }
    urls
}

impl CrawlOrchestrator {
    /// Follows next-page links from `seed_url` up to the page cap.
    ///
    /// A failure on any page after the first stops paging but keeps what was
    /// already collected.
    pub(super) async fn walk_listing(
        &self,
        extractor: &dyn Extractor,
        ctx: FetchContext<'_>,
        seed_url: &str,
    ) -> ListingWalk {
        let mut walk = ListingWalk {
            urls: Vec::new(),
            pages: 0,
            first_page_failed: false,
            cancelled: false,
        };
        let mut visited: HashSet<String> = HashSet::new();
        let mut page_url = seed_url.to_owned();

        while walk.pages < self.settings.max_pages_per_category {
            if self.is_cancelled() {
                walk.cancelled = true;
                break;
            }
            if walk.pages > 0 && !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay.sample()).await;
            }

            visited.insert(page_url.clone());
            let Some(html) = self
                .pool
                .fetch(&page_url, self.settings.max_retries, ctx)
                .await
            else {
                if walk.pages == 0 {
                    walk.first_page_failed = true;
                } else {
                    tracing::warn!(
                        vendor = ctx.vendor,
                        category = %ctx.category,
                        page_url = %page_url,
                        pages = walk.pages,
                        "listing page failed, keeping urls collected so far"
                    );
                }
                break;
            };
            walk.pages += 1;

            let found = extractor.extract_listing_urls(&html, &page_url);
            tracing::debug!(
                vendor = ctx.vendor,
                category = %ctx.category,
                page = walk.pages,
                found = found.len(),
                "listing page parsed"
            );
            walk.urls.extend(found);

            match extractor.extract_next_page_url(&html, &page_url) {
                Some(next) if !visited.contains(&next) => page_url = next,
                _ => break,
            }
        }

        walk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn dedupe_preserves_discovery_order() {
        let deduped = dedupe_urls(urls(&["a", "b", "a", "c", "b"]));
        assert_eq!(deduped, urls(&["a", "b", "c"]));
    }

    #[test]
    fn collect_without_shuffle_keeps_order() {
        let collected = collect_urls(urls(&["x", "y", "x", "z"]), false);
        assert_eq!(collected, urls(&["x", "y", "z"]));
    }

    #[test]
    fn collect_with_shuffle_keeps_the_same_set() {
        let input: Vec<String> = (0..50).map(|i| format!("u{i}")).collect();
        let mut doubled = input.clone();
        doubled.extend(input.clone());
        let mut collected = collect_urls(doubled, true);
        assert_eq!(collected.len(), 50);
        collected.sort();
        let mut expected = input;
        expected.sort();
        assert_eq!(collected, expected);
    }
}
