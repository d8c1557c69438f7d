//! # Deduplication across overlapping catalogs
//!
//! The same supernova can be fitted by several surveys (a nearby object observed by both CSP and
//! JLA, for instance). [`deduplicate`] keeps one record per canonical name, chosen by a declared
//! [`SurveyPriority`]; ties within one survey go to the last occurrence, the way a later row
//! overwrote an earlier one when catalogs were read one after the other.
//!
//! The output keeps the order in which names first appear, and running it twice is a no-op.
use ahash::AHashMap;

use crate::{
    catalog::Survey,
    constants::ObjectName,
    dataset::{ConsolidatedDataset, DatasetState},
    prep_errors::PrepError,
    record::ObjectRecord,
};

/// Surveys ordered from lowest to highest priority: on a duplicate, the later survey wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyPriority {
    order: Vec<Survey>,
}

impl Default for SurveyPriority {
    /// `JLA < Foundation < CSP`, the reading order of the combined sample.
    fn default() -> Self {
        SurveyPriority {
            order: vec![Survey::Jla, Survey::Foundation, Survey::Csp],
        }
    }
}

impl SurveyPriority {
    /// Build a priority order, lowest first.
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::InvalidConfig)` if a survey is listed twice.
    pub fn new(order: Vec<Survey>) -> Result<Self, PrepError> {
        for (i, survey) in order.iter().enumerate() {
            if order[..i].contains(survey) {
                return Err(PrepError::InvalidConfig(format!(
                    "survey {survey} listed twice in the deduplication priority"
                )));
            }
        }
        Ok(SurveyPriority { order })
    }

    pub fn order(&self) -> &[Survey] {
        &self.order
    }

    /// Rank of a survey, higher wins.
    pub fn rank(&self, survey: Survey) -> Option<usize> {
        self.order.iter().position(|s| *s == survey)
    }

    fn require_rank(&self, survey: Survey) -> Result<usize, PrepError> {
        self.rank(survey).ok_or_else(|| {
            PrepError::InvalidConfig(format!(
                "survey {survey} has no deduplication priority (order: {:?})",
                self.order
            ))
        })
    }
}

/// Duplicates removed by [`deduplicate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupReport {
    /// Dropped records: name and survey of the losing record.
    pub dropped: Vec<(ObjectName, Survey)>,
    pub retained: usize,
}

/// Keep one record per canonical name.
///
/// Arguments
/// -----------------
/// * `dataset`: a `raw` (or already `deduplicated`) dataset.
/// * `priority`: survey priority, lowest first.
///
/// Return
/// ----------
/// * `Ok((dataset, report))` with the dataset in state `deduplicated`.
/// * `Err(PrepError::OrderingError)` for any other input state.
/// * `Err(PrepError::InvalidConfig)` if a record's survey is not in `priority`.
pub fn deduplicate(
    dataset: ConsolidatedDataset,
    priority: &SurveyPriority,
) -> Result<(ConsolidatedDataset, DedupReport), PrepError> {
    dataset.require_state(
        "deduplicate",
        &[DatasetState::Raw, DatasetState::Deduplicated],
    )?;

    let mut dataset = dataset;
    let records = dataset.take_records();
    let ranks = records
        .iter()
        .map(|r| priority.require_rank(r.survey))
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = DedupReport::default();
    let mut slots: AHashMap<ObjectName, usize> = AHashMap::with_capacity(records.len());
    let mut kept: Vec<(ObjectRecord, usize)> = Vec::with_capacity(records.len());

    for (record, rank) in records.into_iter().zip(ranks) {
        let Some(&slot) = slots.get(&record.name) else {
            slots.insert(record.name.clone(), kept.len());
            kept.push((record, rank));
            continue;
        };
        let (current, current_rank) = &mut kept[slot];
        let (winner, loser) = if rank >= *current_rank {
            let loser = std::mem::replace(current, record);
            *current_rank = rank;
            (current.survey, loser)
        } else {
            (current.survey, record)
        };
        tracing::info!(
            "duplicate {}: keeping {winner}, dropping {}",
            loser.name,
            loser.survey
        );
        report.dropped.push((loser.name, loser.survey));
    }

    let kept = kept.into_iter().map(|(record, _)| record).collect::<Vec<_>>();
    report.retained = kept.len();
    Ok((
        dataset.with_records(kept, DatasetState::Deduplicated),
        report,
    ))
}
