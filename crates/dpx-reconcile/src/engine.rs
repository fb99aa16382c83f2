use std::collections::{BTreeMap, BTreeSet};

use chrono::{Local, NaiveDateTime};
use dpx_schema::{Schema, SchemaShape, TimeGroupId};
use tracing::{debug, info, warn};

use crate::coerce::coerce;
use crate::watermark::{TimeAdvance, TimeGroupWatermark};
use crate::{CycleReport, DataPoint, GroupView, PointOutcome, RawSnapshot, Sample};

/// Owns the per-cycle state for one schema.
///
/// Cycles take `&mut self`; a host that shares an engine across threads
/// wraps it in a single lock.
#[derive(Clone, Debug)]
pub struct Engine {
    schema: Schema,
    points: Vec<DataPoint>,
    watermarks: BTreeMap<TimeGroupId, TimeGroupWatermark>,
    /// Outcome of the last cycle, parallel to `points`.
    last_outcomes: Vec<PointOutcome>,
}

impl Engine {
    pub fn new(schema: Schema) -> Self {
        let points: Vec<DataPoint> = schema.points().iter().cloned().map(DataPoint::new).collect();
        let watermarks = schema
            .time_group_ids()
            .iter()
            .map(|id| (id.clone(), TimeGroupWatermark::new()))
            .collect();
        let last_outcomes = vec![PointOutcome::Unchanged; points.len()];

        Self {
            schema,
            points,
            watermarks,
            last_outcomes,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Points in schema order.
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn point(&self, name: &str) -> Option<&DataPoint> {
        self.points.iter().find(|p| p.name() == name)
    }

    /// Cached reading time of a time group.
    pub fn time_group_time(&self, id: &str) -> Option<NaiveDateTime> {
        self.watermarks
            .iter()
            .find(|(g, _)| g.as_str() == id)
            .and_then(|(_, wm)| wm.last())
    }

    /// Reconcile a snapshot, stamping unbound points with local wall-clock time.
    pub fn reconcile(&mut self, snapshot: &RawSnapshot) -> CycleReport {
        self.reconcile_at(snapshot, Local::now().naive_local())
    }

    /// Reconcile a snapshot with an explicit wall-clock `now`.
    ///
    /// Every point ends the cycle in exactly one of three states:
    /// - freshly coerced value with updated time
    /// - unchanged prior value and time (its time group did not advance)
    /// - `None` value (eligible but missing or not convertible)
    ///
    /// Never fails; per-field problems are logged and reported in the
    /// returned [`CycleReport`].
    pub fn reconcile_at(&mut self, snapshot: &RawSnapshot, now: NaiveDateTime) -> CycleReport {
        let advanced = self.advance_time_groups(snapshot);

        let mut outcomes: Vec<(String, PointOutcome)> = Vec::with_capacity(self.points.len());
        for (point, last) in self.points.iter_mut().zip(self.last_outcomes.iter_mut()) {
            let outcome = match point.spec().time_id.clone() {
                None => {
                    point.time = Some(now);
                    resolve(point, snapshot)
                }
                Some(id) if advanced.contains(&id) => {
                    point.time = self.watermarks.get(&id).and_then(|wm| wm.last());
                    resolve(point, snapshot)
                }
                Some(_) => PointOutcome::Unchanged,
            };
            *last = outcome.clone();
            outcomes.push((point.name().to_string(), outcome));
        }

        let report = CycleReport {
            now,
            advanced,
            outcomes,
        };
        debug!(
            points = report.outcomes.len(),
            updated = report.updated_count(),
            advanced = report.advanced.len(),
            "reconcile cycle complete"
        );
        report
    }

    /// Values that are new this cycle. Unchanged, missing and failed points
    /// are left out.
    pub fn samples(&self) -> Vec<Sample> {
        self.points
            .iter()
            .zip(self.last_outcomes.iter())
            .filter(|(_, outcome)| outcome.is_updated())
            .filter_map(|(p, _)| {
                Some(Sample {
                    name: p.name().to_string(),
                    value: p.value()?.clone(),
                    time: p.time()?,
                    tags: p.spec().tags.clone(),
                })
            })
            .collect()
    }

    /// Time and current values of every point bound to `id`.
    pub fn group_view(&self, id: &str) -> Option<GroupView> {
        let (group, wm) = self.watermarks.iter().find(|(g, _)| g.as_str() == id)?;
        let values = self
            .points
            .iter()
            .filter(|p| p.spec().time_id.as_ref() == Some(group))
            .filter_map(|p| Some((p.name().to_string(), p.value()?.clone())))
            .collect();

        Some(GroupView {
            id: group.clone(),
            time: wm.last(),
            values,
        })
    }

    /// Step 1 of a cycle: move every declared group's watermark and collect
    /// the ones that advanced.
    fn advance_time_groups(&mut self, snapshot: &RawSnapshot) -> BTreeSet<TimeGroupId> {
        let shape = self.schema.shape();
        let mut advanced = BTreeSet::new();

        for (id, wm) in self.watermarks.iter_mut() {
            let advance = wm.accept(raw_time(shape, snapshot, id));
            let backwards = advance.moved_backwards();
            match advance {
                TimeAdvance::Advanced { previous, current } => {
                    if backwards {
                        warn!(time_group = %id, ?previous, %current, "reading time moved backwards");
                    } else {
                        debug!(time_group = %id, ?previous, %current, "time group advanced");
                    }
                    advanced.insert(id.clone());
                }
                TimeAdvance::Unchanged(t) => {
                    info!(time_group = %id, time = %t, "time not updated from previous request");
                }
                TimeAdvance::Unparsable { raw, error } => {
                    warn!(time_group = %id, raw = %raw, %error, "reading time could not be parsed, ignoring");
                }
                TimeAdvance::Absent => {
                    info!(time_group = %id, "reading time not found in scrape");
                }
            }
        }

        for id in snapshot.times.keys() {
            if !self.schema.declares_time_group(id) {
                debug!(time_group = %id, "scraped time group is not declared in schema");
            }
        }

        advanced
    }
}

/// In the grouped shape the legacy scrape delivers group times inside the
/// value map; the times map still wins when both carry one.
fn raw_time<'a>(shape: SchemaShape, snapshot: &'a RawSnapshot, id: &TimeGroupId) -> Option<&'a str> {
    snapshot.time(id.as_str()).or_else(|| match shape {
        SchemaShape::Grouped => snapshot.value(id.as_str()),
        SchemaShape::Independent => None,
    })
}

/// Look up and coerce one eligible point.
fn resolve(point: &mut DataPoint, snapshot: &RawSnapshot) -> PointOutcome {
    point.value = None;

    let Some(raw) = snapshot.value(&point.spec().source_id) else {
        return PointOutcome::Missing;
    };

    match coerce(raw, &point.spec().data_type) {
        Ok(v) => {
            point.value = Some(v);
            PointOutcome::Updated
        }
        Err(error) => {
            warn!(
                point = point.name(),
                raw,
                data_type = %point.spec().data_type,
                %error,
                "value cannot be converted, ignoring result"
            );
            PointOutcome::ConversionFailed {
                raw: raw.to_string(),
                error,
            }
        }
    }
}
