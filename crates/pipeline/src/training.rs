//! Training-set assembly across labeled sources
//!
//! Every labeled source is first turned into sampling jobs, one per distinct
//! region and date window it implies. A source that cannot be turned into
//! jobs (bad label, nothing usable) is reported and skipped. Jobs then run
//! through the compositor and the backend sampler; a failure there aborts
//! the whole build.

use agriplast_algorithms::sampling::LabeledGeometry;
use agriplast_archive::ImageryBackend;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::compositor::TemporalCompositor;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, SourceFailure};
use crate::feature_table::FeatureTable;
use crate::ground_truth::{LabeledSource, PointSource, PolygonSource};
use crate::roi::RegionOfInterest;
use crate::window::DateWindow;

/// Rows contributed by one composite
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    /// Source name, or `a + b` when polygon sources were merged
    pub source_name: String,
    pub window: DateWindow,
    pub rows: usize,
}

/// Result of [`TrainingSetBuilder::build`]
#[derive(Debug)]
pub struct TrainingSet {
    pub table: FeatureTable,
    pub reports: Vec<SourceReport>,
    pub failures: Vec<SourceFailure>,
}

impl TrainingSet {
    /// `true` when every source contributed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One composite plus the geometries sampled from it
#[derive(Debug)]
struct SamplingJob {
    names: Vec<String>,
    roi: RegionOfInterest,
    window: DateWindow,
    geometries: Vec<LabeledGeometry>,
}

impl SamplingJob {
    fn label(&self) -> String {
        self.names.join(" + ")
    }
}

/// Unions per-source feature rows into one [`FeatureTable`].
pub struct TrainingSetBuilder<'a, B: ImageryBackend + ?Sized> {
    backend: &'a B,
    config: &'a PipelineConfig,
    compositor: TemporalCompositor,
}

impl<'a, B: ImageryBackend + ?Sized> TrainingSetBuilder<'a, B> {
    pub fn new(backend: &'a B, config: &'a PipelineConfig) -> Self {
        Self {
            backend,
            config,
            compositor: TemporalCompositor::training(config),
        }
    }

    /// Replace the compositor, e.g. to draw from another collection.
    pub fn with_compositor(mut self, compositor: TemporalCompositor) -> Self {
        self.compositor = compositor;
        self
    }

    /// Composite, sample and union every source.
    ///
    /// # Errors
    /// Compositor and backend errors abort the build. Per-source input and
    /// label errors are collected in [`TrainingSet::failures`] instead.
    pub fn build(&self, sources: &[LabeledSource]) -> Result<TrainingSet> {
        let mut failures = Vec::new();
        let mut jobs: Vec<SamplingJob> = Vec::new();

        for source in sources {
            let planned = match source {
                LabeledSource::Points(s) => self.plan_points(s),
                LabeledSource::Polygons(s) => self.plan_polygons(s),
            };
            match planned {
                Ok(new_jobs) => {
                    for job in new_jobs {
                        merge_job(&mut jobs, job);
                    }
                }
                Err(error) => {
                    warn!(source = source.name(), %error, "source skipped");
                    failures.push(SourceFailure {
                        source_name: source.name().to_string(),
                        error,
                    });
                }
            }
        }

        let mut table = FeatureTable::new(self.config.bands.clone());
        let mut reports = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let composite = self.compositor.composite(self.backend, &job.roi, job.window)?;
            let samples = self
                .backend
                .sample(&composite.image, &self.config.bands, &job.geometries)?;
            let sampled = samples.len();
            let rows = table.extend_samples(samples);
            info!(
                source = %job.label(),
                window = %job.window,
                geometries = job.geometries.len(),
                rows,
                "sampled"
            );
            if rows < sampled {
                debug!(dropped = sampled - rows, "non-finite rows dropped");
            }
            reports.push(SourceReport {
                source_name: job.label(),
                window: job.window,
                rows,
            });
        }

        table.assign_split(self.config.split_seed);
        info!(
            rows = table.len(),
            sources = sources.len(),
            failed = failures.len(),
            classes = ?table.class_counts(),
            "training set assembled"
        );
        Ok(TrainingSet {
            table,
            reports,
            failures,
        })
    }

    /// One job per unique observation date, over the bounding rectangle of
    /// the retained points.
    fn plan_points(&self, source: &PointSource) -> Result<Vec<SamplingJob>> {
        let labels = &self.config.labels;
        let mut kept = Vec::new();
        let mut excluded = 0usize;
        let mut too_old = 0usize;
        for point in &source.points {
            if self.is_excluded(&point.label) {
                excluded += 1;
                continue;
            }
            let class = labels.resolve(&point.label, &source.name)?;
            if point.date <= self.config.archive_inception {
                too_old += 1;
                continue;
            }
            kept.push((point, class));
        }
        debug!(
            source = %source.name,
            kept = kept.len(),
            excluded,
            before_archive = too_old,
            "points filtered"
        );

        let points: Vec<_> = kept.iter().map(|(p, _)| (*p).clone()).collect();
        let Some(roi) = RegionOfInterest::from_points(&points) else {
            warn!(source = %source.name, "no usable points");
            return Ok(Vec::new());
        };

        let mut dates: Vec<NaiveDate> = Vec::new();
        for (point, _) in &kept {
            if !dates.contains(&point.date) {
                dates.push(point.date);
            }
        }

        dates
            .into_iter()
            .map(|date| {
                let window = DateWindow::around(date, self.config.half_window_days)?;
                let geometries = kept
                    .iter()
                    .filter(|(p, _)| p.date == date)
                    .map(|(p, class)| LabeledGeometry::point(p.longitude, p.latitude, *class))
                    .collect();
                Ok(SamplingJob {
                    names: vec![source.name.clone()],
                    roi: roi.clone(),
                    window,
                    geometries,
                })
            })
            .collect()
    }

    /// One job per window among the source's regions, over its explicit ROI.
    fn plan_polygons(&self, source: &PolygonSource) -> Result<Vec<SamplingJob>> {
        if source.regions.is_empty() {
            return Err(PipelineError::input(&source.name, "no labeled regions"));
        }
        let mut jobs: Vec<SamplingJob> = Vec::new();
        for region in &source.regions {
            let class = self.config.labels.resolve(&region.label, &source.name)?;
            let geometry = LabeledGeometry::new(region.geometry.clone(), class);
            match jobs.iter_mut().find(|j| j.window == region.window) {
                Some(job) => job.geometries.push(geometry),
                None => jobs.push(SamplingJob {
                    names: vec![source.name.clone()],
                    roi: source.roi.clone(),
                    window: region.window,
                    geometries: vec![geometry],
                }),
            }
        }
        Ok(jobs)
    }

    fn is_excluded(&self, label: &str) -> bool {
        let label = label.trim();
        self.config
            .excluded_labels
            .iter()
            .any(|x| x.eq_ignore_ascii_case(label))
    }
}

/// Fold `job` into an existing job over the same region and window.
fn merge_job(jobs: &mut Vec<SamplingJob>, job: SamplingJob) {
    let identity = job.roi.identity();
    match jobs
        .iter_mut()
        .find(|j| j.window == job.window && j.roi.identity() == identity)
    {
        Some(existing) => {
            for name in job.names {
                if !existing.names.contains(&name) {
                    existing.names.push(name);
                }
            }
            existing.geometries.extend(job.geometries);
        }
        None => jobs.push(job),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground_truth::{LabeledPoint, LabeledRegion};
    use crate::test_support::{archive_with_scenes, date, field_bounds, pixel_center};
    use agriplast_algorithms::vector::BoundingBox;

    fn point(row: usize, col: usize, label: &str, d: NaiveDate) -> LabeledPoint {
        let (longitude, latitude) = pixel_center(row, col);
        LabeledPoint {
            longitude,
            latitude,
            label: label.to_string(),
            date: d,
        }
    }

    fn points_source(name: &str, points: Vec<LabeledPoint>) -> LabeledSource {
        PointSource {
            name: name.to_string(),
            points,
        }
        .into()
    }

    #[test]
    fn test_points_one_composite_per_date() {
        let archive = archive_with_scenes();
        let config = PipelineConfig::default();
        let source = points_source(
            "a.csv",
            vec![
                point(1, 1, "hoop", date(2019, 3, 10)),
                point(2, 5, "mulch", date(2019, 3, 10)),
                point(3, 8, "other", date(2019, 6, 1)),
            ],
        );
        let set = TrainingSetBuilder::new(&archive, &config)
            .build(&[source])
            .unwrap();

        assert!(set.is_complete());
        assert_eq!(set.reports.len(), 2);
        assert_eq!(set.table.len(), 3);
        assert_eq!(set.table.labels(), vec![0, 1, 2]);
    }

    #[test]
    fn test_excluded_and_old_points_removed() {
        let archive = archive_with_scenes();
        let config = PipelineConfig::default();
        let source = points_source(
            "b.csv",
            vec![
                point(1, 1, "hoop", date(2019, 6, 1)),
                point(1, 2, "green house", date(2019, 6, 1)),
                point(1, 3, "Green House", date(2019, 6, 1)),
                point(1, 4, "mulch", date(2018, 5, 9)),
            ],
        );
        let set = TrainingSetBuilder::new(&archive, &config)
            .build(&[source])
            .unwrap();

        assert_eq!(set.table.len(), 1);
        assert!(!set.table.labels().contains(&3));
        assert_eq!(set.reports.len(), 1);
    }

    #[test]
    fn test_unknown_label_fails_only_that_source() {
        let archive = archive_with_scenes();
        let config = PipelineConfig::default();
        let bad = points_source("bad.csv", vec![point(0, 0, "tarp", date(2019, 6, 1))]);
        let good = points_source("good.csv", vec![point(0, 0, "hoop", date(2019, 6, 1))]);

        let set = TrainingSetBuilder::new(&archive, &config)
            .build(&[bad, good])
            .unwrap();

        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].source_name, "bad.csv");
        assert!(matches!(
            set.failures[0].error,
            PipelineError::LabelMapping { .. }
        ));
        assert_eq!(set.table.len(), 1);
    }

    #[test]
    fn test_missing_imagery_aborts() {
        let archive = archive_with_scenes();
        let config = PipelineConfig::default();
        let source = points_source("c.csv", vec![point(0, 0, "hoop", date(2020, 1, 1))]);
        let err = TrainingSetBuilder::new(&archive, &config)
            .build(&[source])
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyComposite { .. }));
    }

    #[test]
    fn test_replaced_compositor_reads_its_collection() {
        let archive = archive_with_scenes();
        let config = PipelineConfig::default();
        let source = || points_source("d.csv", vec![point(1, 1, "hoop", date(2019, 6, 1))]);

        let set = TrainingSetBuilder::new(&archive, &config)
            .with_compositor(TemporalCompositor::new(
                config.inference_collection.clone(),
                config.max_cloud_cover,
            ))
            .build(&[source()])
            .unwrap();
        assert_eq!(set.table.len(), 1);

        let err = TrainingSetBuilder::new(&archive, &config)
            .with_compositor(TemporalCompositor::new("missing/collection", 100.0))
            .build(&[source()])
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyComposite { .. }));
    }

    #[test]
    fn test_polygon_sources_sharing_roi_are_merged() {
        let archive = archive_with_scenes();
        let config = PipelineConfig::default();
        let roi = RegionOfInterest::Bounds(field_bounds());
        let window = DateWindow::new(date(2019, 2, 1), date(2019, 6, 1)).unwrap();
        let region = |bb: BoundingBox, label: &str| LabeledRegion {
            geometry: bb.to_polygon().into(),
            label: label.to_string(),
            window,
        };
        // columns 0..2 and 4..5 of rows 0..2
        let hoop = BoundingBox::new(-118.40, 34.08, -118.38, 34.10);
        let mulch = BoundingBox::new(-118.36, 34.08, -118.34, 34.10);
        let a = PolygonSource {
            name: "hoop".into(),
            roi: roi.clone(),
            regions: vec![region(hoop, "hoop")],
        };
        let b = PolygonSource {
            name: "mulch".into(),
            roi,
            regions: vec![region(mulch, "mulch")],
        };

        let set = TrainingSetBuilder::new(&archive, &config)
            .build(&[a.into(), b.into()])
            .unwrap();

        assert_eq!(set.reports.len(), 1);
        assert_eq!(set.reports[0].source_name, "hoop + mulch");
        let counts = set.table.class_counts();
        assert_eq!(counts.get(&0), Some(&4));
        // mulch columns 4..5 straddle the clip edge at column 4
        assert_eq!(counts.get(&1), Some(&2));
    }

    #[test]
    fn test_split_column_assigned() {
        let archive = archive_with_scenes();
        let config = PipelineConfig::default();
        let source = points_source(
            "d.csv",
            (0..5).map(|r| point(r, 0, "hoop", date(2019, 6, 1))).collect(),
        );
        let set = TrainingSetBuilder::new(&archive, &config)
            .build(&[source])
            .unwrap();
        assert!(set.table.rows().iter().any(|r| r.random > 0.0));
    }
}
