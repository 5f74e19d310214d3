//! Catalog population from parsed filesystem series.

use crate::buckets::CatalogBucket;
use crate::error::{StoreError, StoreResult};
use crate::index::OrderedIndex;
use crate::kv::KvWrite;
use crate::pause::PauseController;
use crate::store::Store;
use bindery_common::{ParsedSeries, SeriesMetadata, SeriesSummary, hash_id, natural_cmp};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

impl Store {
    /// Merge parsed series into the store and rewrite the catalog index.
    ///
    /// Holds the pause for the whole run. Each series is merged in its own
    /// write transaction; a series that fails is skipped and its error
    /// collected. The catalog is then ordered by natural title order and
    /// every series position rewritten in one final transaction. Series that
    /// were not part of this scan keep their namespace but lose their slot,
    /// which the missing-item auditor reports.
    pub fn populate_catalog(
        &self,
        parsed: &[ParsedSeries],
        pause: &PauseController,
    ) -> StoreResult<()> {
        let _guard = pause.pause();
        info!(series = parsed.len(), "populating catalog");

        let mut errors = Vec::new();
        let mut summaries = Vec::with_capacity(parsed.len());
        let mut seen = HashSet::new();
        let mut mod_time: Option<DateTime<Utc>> = None;

        for series in parsed {
            if !seen.insert(hash_id(&series.title)) {
                warn!(title = %series.title, "duplicate series title, skipping");
                errors.push(StoreError::DuplicateSeries(series.title.clone()));
                continue;
            }
            match self.update(|t| merge_series(&mut t.catalog(), series)) {
                Ok((summary, series_mod_time)) => {
                    debug!(sid = %summary.hash, title = %series.title, "merged series");
                    mod_time = Some(mod_time.map_or(series_mod_time, |m| m.min(series_mod_time)));
                    summaries.push(summary);
                }
                Err(e) => {
                    warn!(title = %series.title, error = %e, "failed to merge series");
                    errors.push(e);
                }
            }
        }

        // Stable, so equal titles keep scan order
        summaries.sort_by(|a, b| natural_cmp(&a.title, &b.title));
        let added = summaries.len();

        let result = self.update(|t| {
            let mut catalog = t.catalog();
            if let Some(mod_time) = mod_time {
                catalog.set_mod_time(mod_time)?;
            }
            let index = OrderedIndex::from_items(summaries);
            for summary in index.iter() {
                catalog.series(&summary.hash)?.set_order(summary.order)?;
            }
            catalog.set_index(&index)
        });
        if let Err(e) = result {
            error!(error = %e, "failed to write catalog index");
            errors.push(e);
        }

        info!(added, failed = errors.len(), "catalog populated");
        StoreError::aggregate(errors).map_or(Ok(()), Err)
    }
}

/// Add one parsed series and build its catalog summary with the stored
/// override merged in. Returns the summary and the series' modification time.
fn merge_series<K: KvWrite + ?Sized>(
    catalog: &mut CatalogBucket<'_, K>,
    parsed: &ParsedSeries,
) -> StoreResult<(SeriesSummary, DateTime<Utc>)> {
    let sid = catalog.add_series(parsed)?;
    let mut series = catalog.series(&sid)?;
    let entries = series.entries_index()?;

    let mut summary = SeriesSummary {
        order: 0,
        hash: sid.clone(),
        title: series.title()?,
        entries: entries.live(),
        total_pages: entries.iter().map(|e| e.pages).sum(),
        tags: series.tags()?.unwrap_or_default().into_iter().collect(),
        author: None,
        date_released: None,
    };
    if let Some(stored) = series.metadata()? {
        stored.apply_to(&mut summary);
    }
    series.set_metadata(&SeriesMetadata::from_summary(&summary))?;

    let mod_time = series
        .mod_time()?
        .ok_or_else(|| StoreError::SeriesNotFound(sid.clone()))?;
    Ok((summary, mod_time))
}

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::pause::PauseController;
    use crate::store::testutil::*;
    use bindery_common::{Cover, EntryMetadata, MissingKind, ParsedSeries, SeriesMetadata, hash_id};

    fn populate(fx: &Fixture, parsed: &[ParsedSeries]) -> Result<(), StoreError> {
        fx.store.populate_catalog(parsed, &PauseController::new())
    }

    #[test]
    fn test_natural_order_and_positions() {
        let fx = fixture();
        let parsed = [
            series("Vol 10", &[1]),
            series("Vol 2", &[1]),
            series("Vol 1", &[1]),
        ];
        populate(&fx, &parsed).unwrap();

        let catalog = fx.store.catalog().unwrap();
        let titles: Vec<_> = catalog.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Vol 1", "Vol 2", "Vol 10"]);
        for (i, summary) in catalog.iter().enumerate() {
            assert_eq!(summary.order, i + 1);
            assert_eq!(fx.store.series(&summary.hash).unwrap().order, i + 1);
        }
        assert_eq!(fx.store.catalog_mod_time().unwrap(), Some(time(10)));
    }

    #[test]
    fn test_repopulate_is_idempotent() {
        let fx = fixture();
        let parsed = [series("Akira", &[10, 20])];
        populate(&fx, &parsed).unwrap();

        let sid = hash_id("Akira");
        fx.store.set_series_tags(&sid, ["classic"]).unwrap();
        fx.fs.add("/covers/akira.png", b"png");
        fx.store
            .set_series_cover(&sid, &Cover::custom("/covers/akira.png").unwrap())
            .unwrap();

        populate(&fx, &parsed).unwrap();

        assert_eq!(fx.store.catalog().unwrap().len(), 1);
        assert_eq!(fx.store.entries(&sid).unwrap().len(), 2);
        let ids = fx
            .store
            .view(|t| t.catalog().series(&sid)?.entry_ids())
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(fx.store.series(&sid).unwrap().tags, ["classic"]);
        assert!(fx.store.series_cover(&sid).unwrap().is_custom());
    }

    #[test]
    fn test_changed_archive_is_rebuilt() {
        let fx = fixture();
        let sid = hash_id("Akira");
        let vol1 = hash_id("Vol. 1");
        let vol2 = hash_id("Vol. 2");
        populate(&fx, &[series("Akira", &[10, 20])]).unwrap();

        let sibling = EntryMetadata {
            author: Some("Otomo".into()),
            ..Default::default()
        };
        fx.store.set_entry_metadata(&sid, &vol2, &sibling).unwrap();
        fx.store
            .update(|t| t.catalog().entry(&sid, &vol1)?.set_thumbnail(b"stale"))
            .unwrap();

        // Vol. 1 was rewritten with fewer pages
        let mut parsed = series("Akira", &[10, 20]);
        parsed.entries[0] = entry("Akira", "Vol. 1", 1, 8, 20);
        populate(&fx, &[parsed]).unwrap();

        let rebuilt = fx.store.entry(&sid, &vol1).unwrap();
        assert_eq!(rebuilt.pages, 8);
        assert!(fx.store.entry_page(&sid, &vol1, 9).unwrap_err().is_not_found());
        let thumb = fx.store.view(|t| t.catalog().entry(&sid, &vol1)?.thumbnail()).unwrap();
        assert!(thumb.is_none());

        let untouched = fx.store.entry(&sid, &vol2).unwrap();
        assert_eq!(untouched.author.as_deref(), Some("Otomo"));
    }

    #[test]
    fn test_overrides_win_over_parsed_values() {
        let fx = fixture();
        let sid = hash_id("Akira");
        populate(&fx, &[series("Akira", &[1])]).unwrap();
        fx.store
            .set_series_metadata(
                &sid,
                &SeriesMetadata {
                    title: Some("AKIRA".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        populate(&fx, &[series("Akira", &[1])]).unwrap();
        assert_eq!(fx.store.series(&sid).unwrap().title, "AKIRA");
    }

    #[test]
    fn test_bad_series_are_collected() {
        let fx = fixture();
        let empty = ParsedSeries {
            title: "Empty".into(),
            entries: Vec::new(),
        };
        let parsed = [
            series("Akira", &[1]),
            empty,
            series("Akira", &[2]),
            series("Berserk", &[1]),
        ];

        let err = populate(&fx, &parsed).unwrap_err();
        let StoreError::Aggregate(errors) = err else {
            panic!("expected aggregate error");
        };
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], StoreError::NoEntries(_)));
        assert!(matches!(errors[1], StoreError::DuplicateSeries(_)));

        let titles: Vec<_> = fx.store.catalog().unwrap().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, ["Akira", "Berserk"]);
        assert!(!fx.store.has_series(&hash_id("Empty")).unwrap());
    }

    #[test]
    fn test_duplicate_entries_reject_series() {
        let fx = fixture();
        let mut parsed = series("Akira", &[1, 2]);
        parsed.entries[1].archive.title = "Vol. 1".into();

        let err = populate(&fx, &[parsed]).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEntry { .. }));
        assert!(!fx.store.has_series(&hash_id("Akira")).unwrap());
    }

    #[test]
    fn test_dropped_series_loses_its_slot() {
        let fx = fixture();
        populate(&fx, &[series("Akira", &[1]), series("Berserk", &[1])]).unwrap();
        populate(&fx, &[series("Berserk", &[1])]).unwrap();

        let catalog = fx.store.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].title, "Berserk");
        // Namespace survives until the auditor removes it
        assert!(fx.store.has_series(&hash_id("Akira")).unwrap());
        assert!(fx.store.series(&hash_id("Akira")).unwrap_err().is_not_found());
    }

    fn assert_positions_match(fx: &Fixture, sid: &str) {
        for (i, summary) in fx.store.entries(sid).unwrap().iter().enumerate() {
            assert_eq!(summary.order, i + 1);
            assert_eq!(fx.store.entry_order(sid, &summary.hash).unwrap(), i + 1);
            assert_eq!(fx.store.entry(sid, &summary.hash).unwrap().order, i + 1);
        }
    }

    #[test]
    fn test_insert_before_changed_archive_keeps_positions() {
        let fx = fixture();
        let sid = hash_id("Akira");
        populate(&fx, &[series("Akira", &[10, 20])]).unwrap();

        let parsed = ParsedSeries {
            title: "Akira".into(),
            entries: vec![
                entry("Akira", "Vol. 0", 1, 5, 9),
                entry("Akira", "Vol. 1", 2, 10, 10),
                entry("Akira", "Vol. 2", 3, 20, 25),
            ],
        };
        populate(&fx, &[parsed]).unwrap();

        let titles: Vec<_> = fx.store.entries(&sid).unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, ["Vol. 0", "Vol. 1", "Vol. 2"]);
        assert_positions_match(&fx, &sid);
        assert_eq!(fx.store.entry_mod_time(&sid, &hash_id("Vol. 2")).unwrap(), time(25));
        assert!(fx.store.missing_items(&PauseController::new()).unwrap().is_empty());
    }

    #[test]
    fn test_rescan_with_dropped_and_inserted_entries() {
        let fx = fixture();
        let sid = hash_id("Akira");
        populate(&fx, &[series("Akira", &[10, 20, 30])]).unwrap();

        // Vol. 2 is gone, a special lands between Vol. 1 and Vol. 3
        let parsed = ParsedSeries {
            title: "Akira".into(),
            entries: vec![
                entry("Akira", "Vol. 1", 1, 10, 10),
                entry("Akira", "Special", 2, 4, 15),
                entry("Akira", "Vol. 3", 3, 30, 12),
            ],
        };
        populate(&fx, &[parsed]).unwrap();

        let titles: Vec<_> = fx.store.entries(&sid).unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, ["Vol. 1", "Special", "Vol. 3"]);
        assert_positions_match(&fx, &sid);
        assert_eq!(fx.store.series(&sid).unwrap().entries, 3);

        let items = fx.store.missing_items(&PauseController::new()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, MissingKind::Entry);
        assert_eq!(items[0].title, "Vol. 2");
    }
}
