//! Frame pipeline driver.
//!
//! [`FeatureExtractor`] turns reference/distorted frame pairs into feature
//! rows. Each frame goes through size alignment, optional CSF filtering and
//! pyramid decomposition, then the kernels named by the configuration's
//! schemas. Temporal kernels read the previous frame's pyramids, which are
//! threaded explicitly through [`FeatureExtractor::step`] as a
//! [`PreviousState`].

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::activity::ActivityPair;
use crate::config::{
    Band, DlmScope, FeatureKind, FeatureSpec, FrameCountPolicy, PipelineConfig, Resolution,
    SizePolicy, Stage, Stream,
};
use crate::csf::{pixels_per_degree, CsfMode, SpatialFilter};
use crate::dlm::{dlm_pyr, dlm_triple, DlmScores};
use crate::image::{Channel, Frame, Plane};
use crate::motion::mad;
use crate::resample::{align_down, align_up, crop_top_left, pad_reflect, resize_cubic};
use crate::results::{FeatureMatrix, FeatureRow, TimingRow, TimingTable};
use crate::source::Asset;
use crate::ssim::{ms_ssim_pyr, ssim_pyr, Pooled};
use crate::strred::{strred_pyr, StrredLevel};
use crate::vif::vif_pyramid;
use crate::wavelet::Pyramid;
use crate::{Dimensions, FunqueError, Result};

/// Analysis pyramids of the previous frame, per channel.
#[derive(Debug, Clone, Default)]
pub struct PreviousState {
    reference: [Option<Pyramid>; 3],
    distorted: [Option<Pyramid>; 3],
}

impl PreviousState {
    /// Reference pyramid of `channel`, if that channel was processed.
    #[must_use]
    pub fn reference(&self, channel: Channel) -> Option<&Pyramid> {
        self.reference[channel.index()].as_ref()
    }

    /// Distorted pyramid of `channel`, if that channel was processed.
    #[must_use]
    pub fn distorted(&self, channel: Channel) -> Option<&Pyramid> {
        self.distorted[channel.index()].as_ref()
    }

    fn pair(&self, channel: Channel) -> Option<(&Pyramid, &Pyramid)> {
        Some((self.reference(channel)?, self.distorted(channel)?))
    }
}

/// Output of one [`FeatureExtractor::step`].
#[derive(Debug, Clone)]
pub struct Step {
    /// Feature row; `None` for skipped frames.
    pub row: Option<FeatureRow>,
    /// Raw score row; `None` for skipped frames.
    pub scores: Option<FeatureRow>,
    /// Stage durations of this frame.
    pub timing: TimingRow,
    /// State to pass to the next step.
    pub state: PreviousState,
}

/// Tables produced for one asset.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Extraction {
    features: FeatureMatrix,
    scores: FeatureMatrix,
    timing: TimingTable,
}

impl Extraction {
    /// Feature matrix, one row per kept frame.
    #[must_use]
    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        self.features.names()
    }

    /// Raw per-level scores, one row per kept frame.
    #[must_use]
    pub fn scores(&self) -> &FeatureMatrix {
        &self.scores
    }

    /// Stage durations, one row per processed frame.
    #[must_use]
    pub fn timing(&self) -> &TimingTable {
        &self.timing
    }

    /// Feature values as a row-major matrix, with their names.
    #[must_use]
    pub fn into_feature_matrix(self) -> (Vec<Vec<f64>>, Vec<String>) {
        self.features.into_parts()
    }
}

/// Working and aligned sizes of one asset.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    working: Dimensions,
    aligned: Dimensions,
}

/// Geometry and CSF kernels shared by every frame of one asset.
#[derive(Debug, Clone)]
struct FramePlan {
    source: Dimensions,
    geometry: Geometry,
    ppd: f64,
    spatial: Option<SpatialFilter>,
}

/// Analysis pyramids of one stream and channel.
struct ChannelPyramids {
    analysis: Pyramid,
    /// Deeper pyramid for VIF when extra levels are configured.
    vif: Option<Pyramid>,
}

impl ChannelPyramids {
    fn vif(&self) -> &Pyramid {
        self.vif.as_ref().unwrap_or(&self.analysis)
    }
}

/// Kernel outputs of one channel for one frame.
#[derive(Debug, Default)]
struct ChannelOutputs {
    vif: Vec<f64>,
    ssim: Option<Pooled>,
    ms_ssim: Vec<Pooled>,
    dlm: Option<DlmScores>,
    activity: Option<ActivityPair>,
    mad: Option<f64>,
    motion: Vec<(Stream, Band, f64)>,
    strred: Vec<StrredLevel>,
    /// Whether a previous frame was available.
    temporal: bool,
}

impl ChannelOutputs {
    fn value(&self, kind: FeatureKind) -> Result<f64> {
        if kind.is_temporal() && !self.temporal {
            return Ok(0.0);
        }
        let value = match kind {
            FeatureKind::VifApprox { level } => self.vif.get(level).copied(),
            FeatureKind::Ssim { pool } => self.ssim.map(|p| p.get(pool)),
            FeatureKind::MsSsim { pool, level } => self.ms_ssim.get(level).map(|p| p.get(pool)),
            FeatureKind::Dlm => self.dlm.as_ref().map(|d| d.overall),
            FeatureKind::DlmLevel { level } => {
                self.dlm.as_ref().and_then(|d| d.levels.get(level).copied())
            }
            FeatureKind::Srred { level } => self.strred.get(level).map(|s| s.srred),
            FeatureKind::Trred { level } => self.strred.get(level).map(|s| s.trred),
            FeatureKind::Strred { level } => self.strred.get(level).map(|s| s.strred),
            FeatureKind::Motion { stream, band } => self
                .motion
                .iter()
                .find(|(s, b, _)| *s == stream && *b == band)
                .map(|(_, _, v)| *v),
            FeatureKind::Mad => self.mad,
            FeatureKind::Edge => self.activity.map(ActivityPair::edge),
            FeatureKind::Blur => self.activity.map(ActivityPair::blur),
            FeatureKind::SaiDiff => self.activity.map(ActivityPair::sai_diff),
        };
        value.ok_or_else(|| FunqueError::InvalidParameter {
            name: "feature",
            reason: format!("no kernel output for {kind:?}"),
        })
    }
}

fn frame_dimensions(frame: &Frame) -> Dimensions {
    Dimensions::new(frame.width(), frame.height())
}

fn check_interval(interval: usize) -> Result<()> {
    if interval == 0 {
        return Err(FunqueError::InvalidParameter {
            name: "sample_interval",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Computes feature rows for frame pairs under one [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: PipelineConfig,
}

impl FeatureExtractor {
    /// Creates an extractor for a validated configuration.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn geometry(&self, source: Dimensions) -> Result<Geometry> {
        let working = match self.config.resolution() {
            Resolution::Full => source,
            Resolution::Half => Dimensions::new(source.width / 2, source.height / 2),
        };
        let levels = self.config.decomposition_levels() as u32;
        let aligned = match self.config.size_policy() {
            SizePolicy::Pad => Dimensions::new(
                align_up(working.width, levels),
                align_up(working.height, levels),
            ),
            SizePolicy::Crop => Dimensions::new(
                align_down(working.width, levels),
                align_down(working.height, levels),
            ),
        };
        if working.width == 0 || working.height == 0 || aligned.width == 0 || aligned.height == 0 {
            let side = 1usize << levels;
            return Err(FunqueError::DimensionMismatch {
                expected: Dimensions::new(side, side),
                actual: working,
            });
        }
        Ok(Geometry { working, aligned })
    }

    fn plan(&self, source: Dimensions) -> Result<FramePlan> {
        let geometry = self.geometry(source)?;
        let ppd = pixels_per_degree(self.config.viewing_distance(), geometry.aligned.height);
        let spatial = match self.config.csf() {
            Some(model) if model.mode() == CsfMode::Spatial => Some(SpatialFilter::new(model, ppd)?),
            _ => None,
        };
        Ok(FramePlan {
            source,
            geometry,
            ppd,
            spatial,
        })
    }

    /// Resamples a plane to the working size, then pads or crops it.
    fn align_plane(&self, plane: &Plane, geometry: Geometry) -> Result<Plane> {
        let Geometry { working, aligned } = geometry;
        let resized = if plane.dimensions() == working {
            plane.clone()
        } else {
            resize_cubic(plane, working.width, working.height)?
        };
        if aligned == working {
            return Ok(resized);
        }
        match self.config.size_policy() {
            SizePolicy::Pad => pad_reflect(&resized, aligned.width, aligned.height),
            SizePolicy::Crop => crop_top_left(&resized, aligned.width, aligned.height),
        }
    }

    fn build_pyramids(
        &self,
        plane: Plane,
        channel: Channel,
        plan: &FramePlan,
        timing: &mut TimingRow,
    ) -> Result<ChannelPyramids> {
        let start = Instant::now();
        let filtered = match &plan.spatial {
            Some(filter) => filter.apply(&plane, channel),
            None => plane,
        };
        timing.filters += start.elapsed().as_secs_f64();

        let start = Instant::now();
        let mut full = Pyramid::decompose(
            &filtered,
            self.config.wavelet(),
            self.config.decomposition_levels(),
        )?;
        timing.dwt += start.elapsed().as_secs_f64();

        if let Some(model) = self.config.csf().filter(|m| m.mode() == CsfMode::Subband) {
            let start = Instant::now();
            model.filter_pyramid(&mut full, channel, plan.ppd)?;
            timing.filters += start.elapsed().as_secs_f64();
        }

        if self.config.vif_extra_levels() == 0 {
            return Ok(ChannelPyramids {
                analysis: full,
                vif: None,
            });
        }
        let start = Instant::now();
        let analysis = full.truncated(self.config.levels())?;
        timing.dwt += start.elapsed().as_secs_f64();
        Ok(ChannelPyramids {
            analysis,
            vif: Some(full),
        })
    }

    /// Runs the kernels that the schemas read from `channel`.
    fn run_kernels(
        &self,
        channel: Channel,
        reference: &ChannelPyramids,
        distorted: &ChannelPyramids,
        previous: Option<(&Pyramid, &Pyramid)>,
        stage_times: &mut [f64],
    ) -> Result<ChannelOutputs> {
        let kinds: Vec<FeatureKind> = self.config.kinds_for(channel).collect();
        let (ref_pyr, dis_pyr) = (&reference.analysis, &distorted.analysis);
        let mut out = ChannelOutputs {
            temporal: previous.is_some(),
            ..ChannelOutputs::default()
        };

        for (slot, &stage) in self.config.stages().iter().enumerate() {
            if !kinds.iter().any(|k| k.stage() == stage) {
                continue;
            }
            let start = Instant::now();
            match stage {
                Stage::Vif => {
                    out.vif = vif_pyramid(reference.vif(), distorted.vif(), self.config.vif_params())?;
                }
                Stage::Ssim => {
                    out.ssim = Some(ssim_pyr(ref_pyr, dis_pyr, self.config.ssim_params())?);
                }
                Stage::MsSsim => {
                    out.ms_ssim = ms_ssim_pyr(ref_pyr, dis_pyr, self.config.ssim_params())?;
                }
                Stage::Dlm => {
                    let params = self.config.dlm_params();
                    out.dlm = Some(match self.config.dlm_scope() {
                        DlmScope::AllLevels => dlm_pyr(ref_pyr, dis_pyr, params)?,
                        DlmScope::CoarsestLevel => DlmScores {
                            overall: dlm_triple(
                                ref_pyr.coarsest_details(),
                                dis_pyr.coarsest_details(),
                                params,
                            )?,
                            levels: Vec::new(),
                        },
                    });
                }
                Stage::Activity => {
                    out.activity = Some(ActivityPair::from_details(
                        ref_pyr.coarsest_details(),
                        dis_pyr.coarsest_details(),
                    )?);
                }
                Stage::Mad => {
                    if kinds.contains(&FeatureKind::Mad) {
                        out.mad = Some(mad(
                            ref_pyr.coarsest_approximation(),
                            dis_pyr.coarsest_approximation(),
                        )?);
                    }
                    if let Some((prev_ref, prev_dis)) = previous {
                        for kind in &kinds {
                            let FeatureKind::Motion { stream, band } = *kind else {
                                continue;
                            };
                            if out.motion.iter().any(|(s, b, _)| *s == stream && *b == band) {
                                continue;
                            }
                            let (current, prior) = match stream {
                                Stream::Reference => (ref_pyr, prev_ref),
                                Stream::Distorted => (dis_pyr, prev_dis),
                            };
                            let level = match band {
                                Band::Finest => 0,
                                Band::Coarsest => current.levels() - 1,
                            };
                            let value = mad(current.approximation(level), prior.approximation(level))?;
                            out.motion.push((stream, band, value));
                        }
                    }
                }
                Stage::Strred => {
                    if let Some((prev_ref, prev_dis)) = previous {
                        out.strred = strred_pyr(
                            ref_pyr,
                            dis_pyr,
                            prev_ref,
                            prev_dis,
                            self.config.strred_params(),
                        )?;
                    }
                }
            }
            let elapsed = start.elapsed().as_secs_f64();
            stage_times[slot] += elapsed;
            trace!(channel = channel.name(), stage = stage.name(), elapsed, "kernel done");
        }
        Ok(out)
    }

    /// Processes frame `index` of an asset.
    ///
    /// The frame's pyramids are always built and returned as the next
    /// state. Kernels only run when `index % interval == 0`; temporal
    /// kernels additionally need a previous state and `index > 0`, and
    /// output 0 otherwise.
    ///
    /// # Errors
    /// Returns [`FunqueError::DimensionMismatch`] if the frames differ in
    /// size or cannot be aligned, [`FunqueError::InvalidParameter`] for an
    /// interval of 0 or missing chroma planes, and propagates kernel errors.
    pub fn step(
        &self,
        index: usize,
        reference: &Frame,
        distorted: &Frame,
        previous: Option<&PreviousState>,
        interval: usize,
    ) -> Result<Step> {
        check_interval(interval)?;
        let plan = self.plan(frame_dimensions(reference))?;
        self.step_planned(&plan, index, reference, distorted, previous, interval)
    }

    fn step_planned(
        &self,
        plan: &FramePlan,
        index: usize,
        reference: &Frame,
        distorted: &Frame,
        previous: Option<&PreviousState>,
        interval: usize,
    ) -> Result<Step> {
        let dims = frame_dimensions(reference);
        if dims != plan.source {
            return Err(FunqueError::DimensionMismatch {
                expected: plan.source,
                actual: dims,
            });
        }
        if frame_dimensions(distorted) != dims {
            return Err(FunqueError::DimensionMismatch {
                expected: dims,
                actual: frame_dimensions(distorted),
            });
        }
        let channels = self.config.channels().channels();
        let frame_start = Instant::now();
        let mut timing = TimingRow {
            frame: index,
            stages: vec![0.0; self.config.stages().len()],
            ..TimingRow::default()
        };

        let start = Instant::now();
        let geometry = plan.geometry;
        let mut aligned = Vec::with_capacity(channels.len());
        for &channel in channels {
            let planes = (reference.plane(channel), distorted.plane(channel));
            let (Some(r), Some(d)) = planes else {
                return Err(FunqueError::InvalidParameter {
                    name: "channels",
                    reason: format!("frame {index} has no {} plane", channel.name()),
                });
            };
            aligned.push((
                channel,
                self.align_plane(r, geometry)?,
                self.align_plane(d, geometry)?,
            ));
        }
        timing.resizer = start.elapsed().as_secs_f64();

        let mut pyramids = Vec::with_capacity(aligned.len());
        for (channel, r, d) in aligned {
            let r = self.build_pyramids(r, channel, plan, &mut timing)?;
            let d = self.build_pyramids(d, channel, plan, &mut timing)?;
            pyramids.push((channel, r, d));
        }

        let keep = index % interval == 0;
        let (row, scores) = if keep {
            let previous = previous.filter(|_| index > 0);
            let mut outputs: [Option<ChannelOutputs>; 3] = [None, None, None];
            for (channel, r, d) in &pyramids {
                let prior = previous.and_then(|p| p.pair(*channel));
                outputs[channel.index()] =
                    Some(self.run_kernels(*channel, r, d, prior, &mut timing.stages)?);
            }
            let collect = |specs: &[FeatureSpec]| -> Result<FeatureRow> {
                let values = specs
                    .iter()
                    .map(|spec| {
                        outputs[spec.channel.index()]
                            .as_ref()
                            .ok_or_else(|| FunqueError::InvalidParameter {
                                name: "channels",
                                reason: format!("column '{}' reads an unprocessed channel", spec.name),
                            })?
                            .value(spec.kind)
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Ok(FeatureRow { frame: index, values })
            };
            (
                Some(collect(self.config.features())?),
                Some(collect(self.config.scores())?),
            )
        } else {
            (None, None)
        };

        let mut state = PreviousState::default();
        for (channel, r, d) in pyramids {
            state.reference[channel.index()] = Some(r.analysis);
            state.distorted[channel.index()] = Some(d.analysis);
        }
        timing.time_taken = frame_start.elapsed().as_secs_f64();
        debug!(frame = index, kept = keep, time_taken = timing.time_taken, "frame processed");

        Ok(Step {
            row,
            scores,
            timing,
            state,
        })
    }

    /// Extracts features from in-memory or streamed frame pairs.
    ///
    /// Frames are processed in order until either stream ends. Every
    /// decoded frame must match the size of the first reference frame.
    ///
    /// # Errors
    /// Returns [`FunqueError::FrameCountMismatch`] under the strict policy
    /// when the streams differ in length, and propagates decode and
    /// [`Self::step`] errors.
    pub fn extract_frames<R, D>(
        &self,
        reference: R,
        distorted: D,
        interval: usize,
    ) -> Result<Extraction>
    where
        R: IntoIterator<Item = Result<Frame>>,
        D: IntoIterator<Item = Result<Frame>>,
    {
        check_interval(interval)?;
        let mut reference = reference.into_iter();
        let mut distorted = distorted.into_iter();
        let mut features = FeatureMatrix::new(self.config.feature_names());
        let mut scores =
            FeatureMatrix::new(self.config.scores().iter().map(|s| s.name.clone()).collect());
        let mut timing =
            TimingTable::new(self.config.stages().iter().map(|s| s.name().to_string()).collect());

        let mut previous: Option<PreviousState> = None;
        let mut plan: Option<FramePlan> = None;
        let mut index = 0;
        loop {
            let (r, d) = match (reference.next(), distorted.next()) {
                (Some(r), Some(d)) => (r?, d?),
                (None, None) => break,
                (r, d) => {
                    if self.config.frame_count_policy() == FrameCountPolicy::Truncate {
                        warn!(frames = index, "streams differ in length, truncating to the shorter one");
                        break;
                    }
                    let remaining_ref = r.map_or(0, |_| 1 + reference.by_ref().count());
                    let remaining_dis = d.map_or(0, |_| 1 + distorted.by_ref().count());
                    return Err(FunqueError::FrameCountMismatch {
                        reference: index + remaining_ref,
                        distorted: index + remaining_dis,
                    });
                }
            };
            let current = match plan.take() {
                Some(current) => current,
                None => self.plan(frame_dimensions(&r))?,
            };
            let step = self.step_planned(&current, index, &r, &d, previous.as_ref(), interval)?;
            plan = Some(current);
            if let Some(row) = step.row {
                features.push(row)?;
            }
            if let Some(row) = step.scores {
                scores.push(row)?;
            }
            timing.push(step.timing);
            previous = Some(step.state);
            index += 1;
        }

        Ok(Extraction {
            features,
            scores,
            timing,
        })
    }

    /// Extracts features for one asset and writes any requested tables.
    ///
    /// # Errors
    /// Returns [`FunqueError::Io`] if a stream cannot be read or a table
    /// cannot be written, [`FunqueError::DimensionMismatch`] if a decoded
    /// frame disagrees with the declared size, and anything
    /// [`Self::extract_frames`] returns.
    pub fn extract(&self, asset: &Asset) -> Result<Extraction> {
        let start = Instant::now();
        let declared = |dims: Dimensions| {
            move |frame: Result<Frame>| {
                let frame = frame?;
                if frame_dimensions(&frame) != dims {
                    return Err(FunqueError::DimensionMismatch {
                        expected: dims,
                        actual: frame_dimensions(&frame),
                    });
                }
                Ok(frame)
            }
        };
        let reference = asset
            .reference
            .open()?
            .map(declared(asset.reference.dimensions()));
        let distorted = asset
            .distorted
            .open()?
            .map(declared(asset.distorted.dimensions()));

        let extraction = self.extract_frames(reference, distorted, asset.interval())?;

        if let Some(path) = &asset.feature_table {
            write_table(path, |out| extraction.features.write_csv(out))?;
        }
        if let Some(path) = &asset.score_table {
            write_table(path, |out| extraction.scores.write_csv(out))?;
        }
        if let Some(path) = &asset.timing_table {
            write_table(path, |out| extraction.timing.write_csv(out))?;
        }

        info!(
            variant = self.config.variant().name(),
            frames = extraction.timing.rows().len(),
            kept = extraction.features.len(),
            elapsed = start.elapsed().as_secs_f64(),
            "Processed {}",
            asset.distorted.path.display()
        );
        Ok(extraction)
    }
}

fn write_table(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<()> {
    let to_error = |source| FunqueError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(to_error)?;
    let mut out = BufWriter::new(file);
    write(&mut out).map_err(to_error)?;
    io::Write::flush(&mut out).map_err(to_error)
}
