//! Pipeline configuration.
//!
//! A [`PipelineConfig`] fixes everything about a run: geometry, wavelet,
//! CSF model, channels, kernel parameters and the two output schemas. The
//! six named [`Variant`]s are presets of the same builder; nothing about a
//! variant is hard-wired into the extractor.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::consts::VIEWING_DISTANCE;
use crate::csf::CsfModel;
use crate::dlm::DlmParams;
use crate::image::Channel;
use crate::ssim::{Pooling, SsimParams};
use crate::strred::StrredParams;
use crate::vif::VifParams;
use crate::wavelet::Wavelet;
use crate::{FunqueError, Result};

/// Largest supported pyramid depth.
pub const MAX_LEVELS: usize = 8;

const SCORE_PREFIX: &str = "FUNQUE_feature_";

/// Named pipeline presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Variant {
    /// FUNQUE: half resolution, spatial Ngan CSF, 1 level (+1 for VIF).
    Funque,
    /// Y-FUNQUE+: half resolution luma, 4 levels, Nadenau subband weights.
    YFunquePlus,
    /// FS-Y-FUNQUE+: full resolution luma, 4 levels, spatial Nadenau CSF.
    FsYFunquePlus,
    /// 3C-FUNQUE+: half resolution YUV, 2 levels, Li subband weights.
    ThreeCFunquePlus,
    /// FS-3C-FUNQUE+: full resolution YUV, 3 levels, Watson subband weights.
    FsThreeCFunquePlus,
    /// VMAF-like: full resolution luma, cropped, 4 levels.
    VmafLike,
}

impl Variant {
    /// Every variant.
    pub const ALL: [Variant; 6] = [
        Variant::Funque,
        Variant::YFunquePlus,
        Variant::FsYFunquePlus,
        Variant::ThreeCFunquePlus,
        Variant::FsThreeCFunquePlus,
        Variant::VmafLike,
    ];

    /// Display name, e.g. `Y-FUNQUE+`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Variant::Funque => "FUNQUE",
            Variant::YFunquePlus => "Y-FUNQUE+",
            Variant::FsYFunquePlus => "FS-Y-FUNQUE+",
            Variant::ThreeCFunquePlus => "3C-FUNQUE+",
            Variant::FsThreeCFunquePlus => "FS-3C-FUNQUE+",
            Variant::VmafLike => "VMAF-like",
        }
    }

    /// Feature extractor identifier stored alongside results.
    #[must_use]
    pub fn extractor_id(self) -> &'static str {
        match self {
            Variant::Funque => "FUNQUE_fex",
            Variant::YFunquePlus => "Y_FUNQUE_Plus_fex",
            Variant::FsYFunquePlus => "FS_Y_FUNQUE_Plus_fex",
            Variant::ThreeCFunquePlus => "3C_FUNQUE_Plus_fex",
            Variant::FsThreeCFunquePlus => "FS_3C_FUNQUE_Plus_fex",
            Variant::VmafLike => "VMAF_Like_fex",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Variant::Funque => "funque",
            Variant::YFunquePlus => "y_funque_plus",
            Variant::FsYFunquePlus => "fs_y_funque_plus",
            Variant::ThreeCFunquePlus => "3c_funque_plus",
            Variant::FsThreeCFunquePlus => "fs_3c_funque_plus",
            Variant::VmafLike => "vmaf_like",
        }
    }
}

impl FromStr for Variant {
    type Err = FunqueError;

    /// Accepts slugs (`y_funque_plus`), display names (`Y-FUNQUE+`) and
    /// extractor ids (`Y_FUNQUE_Plus_fex`), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .replace('-', "_")
            .replace('+', "_plus");
        let normalized = normalized.strip_suffix("_fex").unwrap_or(&normalized);
        if normalized == "vmaf" {
            return Ok(Variant::VmafLike);
        }
        Variant::ALL
            .into_iter()
            .find(|v| v.slug() == normalized)
            .ok_or_else(|| FunqueError::UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Working resolution relative to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Source resolution.
    Full,
    /// Half width and height, cubic downsampling.
    Half,
}

/// How the working size is aligned to `2^levels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Reflect padding up to the next multiple.
    Pad,
    /// Top-left crop down to the previous multiple.
    Crop,
}

/// Channels carried through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSet {
    /// Luma only.
    Luma,
    /// Y, U and V.
    Yuv,
}

impl ChannelSet {
    /// Channels in processing order.
    #[must_use]
    pub fn channels(self) -> &'static [Channel] {
        match self {
            ChannelSet::Luma => &Channel::ALL[..1],
            ChannelSet::Yuv => &Channel::ALL,
        }
    }
}

/// Which detail levels the DLM kernel sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlmScope {
    /// All analysis levels, with a per-level breakdown.
    AllLevels,
    /// The coarsest detail triple only.
    CoarsestLevel,
}

/// Behaviour when the two streams differ in length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameCountPolicy {
    /// Fail with [`FunqueError::FrameCountMismatch`].
    #[default]
    Strict,
    /// Stop at the shorter stream and log a warning.
    Truncate,
}

/// Stream whose frames a temporal difference is taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Stream {
    Reference,
    Distorted,
}

/// Approximation level used by motion features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Band {
    Finest,
    Coarsest,
}

/// Kernel output a column is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FeatureKind {
    /// VIF of approximation `level` of the (possibly deeper) VIF pyramid.
    VifApprox { level: usize },
    /// Single-scale SSIM at the coarsest analysis level.
    Ssim { pool: Pooling },
    /// MS-SSIM at `level`.
    MsSsim { pool: Pooling, level: usize },
    /// DLM over the configured scope.
    Dlm,
    /// DLM of one level; needs [`DlmScope::AllLevels`].
    DlmLevel { level: usize },
    /// Spatial entropy difference at `level`.
    Srred { level: usize },
    /// Temporal entropy difference at `level`.
    Trred { level: usize },
    /// Product of the two at `level`.
    Strred { level: usize },
    /// Mean absolute frame difference of one stream.
    Motion { stream: Stream, band: Band },
    /// Mean absolute reference/distorted difference of the coarsest approximation.
    Mad,
    /// Activity added by the distortion.
    Edge,
    /// Activity removed by the distortion.
    Blur,
    /// Difference of fourth-root activities.
    SaiDiff,
}

impl FeatureKind {
    /// Whether the value depends on the previous frame. Temporal values are
    /// 0 at the first frame.
    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FeatureKind::Srred { .. }
                | FeatureKind::Trred { .. }
                | FeatureKind::Strred { .. }
                | FeatureKind::Motion { .. }
        )
    }

    /// Kernel stage producing the value.
    #[must_use]
    pub fn stage(self) -> Stage {
        match self {
            FeatureKind::VifApprox { .. } => Stage::Vif,
            FeatureKind::Ssim { .. } => Stage::Ssim,
            FeatureKind::MsSsim { .. } => Stage::MsSsim,
            FeatureKind::Dlm | FeatureKind::DlmLevel { .. } => Stage::Dlm,
            FeatureKind::Edge | FeatureKind::Blur | FeatureKind::SaiDiff => Stage::Activity,
            FeatureKind::Mad | FeatureKind::Motion { .. } => Stage::Mad,
            FeatureKind::Srred { .. } | FeatureKind::Trred { .. } | FeatureKind::Strred { .. } => {
                Stage::Strred
            }
        }
    }
}

/// Kernel stages in execution order; also the timing table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Stage {
    Vif,
    Ssim,
    MsSsim,
    Dlm,
    Activity,
    Mad,
    Strred,
}

impl Stage {
    /// Timing column name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Stage::Vif => "vif",
            Stage::Ssim => "ssim",
            Stage::MsSsim => "ms_ssim",
            Stage::Dlm => "adm",
            Stage::Activity => "activity",
            Stage::Mad => "mad",
            Stage::Strred => "strred",
        }
    }
}

/// One named output column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureSpec {
    /// Column name.
    pub name: String,
    /// Channel the value is computed on.
    pub channel: Channel,
    /// Kernel output.
    pub kind: FeatureKind,
}

impl FeatureSpec {
    /// Creates a column.
    pub fn new(name: impl Into<String>, channel: Channel, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            channel,
            kind,
        }
    }
}

/// Immutable configuration of one extraction run.
///
/// Built with [`PipelineConfig::builder`]; the feature and score schemas
/// are resolved and checked by [`PipelineConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    variant: Variant,
    wavelet: Wavelet,
    levels: usize,
    vif_extra_levels: usize,
    resolution: Resolution,
    size_policy: SizePolicy,
    csf: Option<CsfModel>,
    channels: ChannelSet,
    dlm_scope: DlmScope,
    vif: VifParams,
    ssim: SsimParams,
    strred: StrredParams,
    dlm: DlmParams,
    viewing_distance: f64,
    frame_count_policy: FrameCountPolicy,
    features: Vec<FeatureSpec>,
    scores: Vec<FeatureSpec>,
    stages: Vec<Stage>,
}

impl PipelineConfig {
    /// Starts from the preset of `variant`.
    #[must_use]
    pub fn builder(variant: Variant) -> PipelineConfigBuilder {
        PipelineConfigBuilder::new(variant)
    }

    /// The preset of `variant`, unchanged.
    ///
    /// # Errors
    /// Never fails for the built-in presets; see [`PipelineConfigBuilder::build`].
    pub fn new(variant: Variant) -> Result<Self> {
        Self::builder(variant).build()
    }

    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    #[must_use]
    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    /// Analysis pyramid depth.
    #[must_use]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Extra levels decomposed only for VIF.
    #[must_use]
    pub fn vif_extra_levels(&self) -> usize {
        self.vif_extra_levels
    }

    /// Depth actually decomposed, and the power of two sizes are aligned to.
    #[must_use]
    pub fn decomposition_levels(&self) -> usize {
        self.levels + self.vif_extra_levels
    }

    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[must_use]
    pub fn size_policy(&self) -> SizePolicy {
        self.size_policy
    }

    #[must_use]
    pub fn csf(&self) -> Option<CsfModel> {
        self.csf
    }

    #[must_use]
    pub fn channels(&self) -> ChannelSet {
        self.channels
    }

    #[must_use]
    pub fn dlm_scope(&self) -> DlmScope {
        self.dlm_scope
    }

    #[must_use]
    pub fn vif_params(&self) -> VifParams {
        self.vif
    }

    #[must_use]
    pub fn ssim_params(&self) -> SsimParams {
        self.ssim
    }

    #[must_use]
    pub fn strred_params(&self) -> StrredParams {
        self.strred
    }

    #[must_use]
    pub fn dlm_params(&self) -> DlmParams {
        self.dlm
    }

    /// Viewing distance in picture heights.
    #[must_use]
    pub fn viewing_distance(&self) -> f64 {
        self.viewing_distance
    }

    #[must_use]
    pub fn frame_count_policy(&self) -> FrameCountPolicy {
        self.frame_count_policy
    }

    /// Feature matrix columns, in order.
    #[must_use]
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Feature matrix column names, in order.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// Raw score table columns, in order.
    #[must_use]
    pub fn scores(&self) -> &[FeatureSpec] {
        &self.scores
    }

    /// Kernel stages the run executes, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Columns that read `channel`, from both schemas.
    pub(crate) fn kinds_for(&self, channel: Channel) -> impl Iterator<Item = FeatureKind> + '_ {
        self.features
            .iter()
            .chain(&self.scores)
            .filter(move |f| f.channel == channel)
            .map(|f| f.kind)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
    variant: Variant,
    wavelet: Wavelet,
    levels: usize,
    vif_extra_levels: usize,
    resolution: Resolution,
    size_policy: SizePolicy,
    csf: Option<CsfModel>,
    channels: ChannelSet,
    dlm_scope: DlmScope,
    vif: VifParams,
    ssim: SsimParams,
    strred: StrredParams,
    dlm: DlmParams,
    viewing_distance: f64,
    frame_count_policy: FrameCountPolicy,
}

impl PipelineConfigBuilder {
    fn new(variant: Variant) -> Self {
        let base = Self {
            variant,
            wavelet: Wavelet::Haar,
            levels: 4,
            vif_extra_levels: 0,
            resolution: Resolution::Full,
            size_policy: SizePolicy::Pad,
            csf: None,
            channels: ChannelSet::Luma,
            dlm_scope: DlmScope::CoarsestLevel,
            vif: VifParams::default(),
            ssim: SsimParams::default(),
            strred: StrredParams::default(),
            dlm: DlmParams::default(),
            viewing_distance: VIEWING_DISTANCE,
            frame_count_policy: FrameCountPolicy::Strict,
        };
        match variant {
            Variant::Funque => Self {
                levels: 1,
                vif_extra_levels: 1,
                resolution: Resolution::Half,
                csf: Some(CsfModel::NganSpat),
                dlm_scope: DlmScope::AllLevels,
                ..base
            },
            Variant::YFunquePlus => Self {
                resolution: Resolution::Half,
                csf: Some(CsfModel::NadenauWeight),
                ..base
            },
            Variant::FsYFunquePlus => Self {
                csf: Some(CsfModel::NadenauSpat),
                ..base
            },
            Variant::ThreeCFunquePlus => Self {
                levels: 2,
                resolution: Resolution::Half,
                csf: Some(CsfModel::Li),
                channels: ChannelSet::Yuv,
                ..base
            },
            Variant::FsThreeCFunquePlus => Self {
                levels: 3,
                csf: Some(CsfModel::Watson),
                channels: ChannelSet::Yuv,
                ..base
            },
            Variant::VmafLike => Self {
                size_policy: SizePolicy::Crop,
                csf: Some(CsfModel::NadenauWeight),
                dlm_scope: DlmScope::AllLevels,
                ..base
            },
        }
    }

    #[must_use]
    pub fn with_wavelet(mut self, wavelet: Wavelet) -> Self {
        self.wavelet = wavelet;
        self
    }

    /// Sets the analysis pyramid depth. Schema names follow the new depth.
    #[must_use]
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    #[must_use]
    pub fn with_vif_extra_levels(mut self, extra: usize) -> Self {
        self.vif_extra_levels = extra;
        self
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    #[must_use]
    pub fn with_size_policy(mut self, policy: SizePolicy) -> Self {
        self.size_policy = policy;
        self
    }

    /// Sets the CSF model, or disables CSF weighting with `None`.
    #[must_use]
    pub fn with_csf(mut self, csf: Option<CsfModel>) -> Self {
        self.csf = csf;
        self
    }

    #[must_use]
    pub fn with_channels(mut self, channels: ChannelSet) -> Self {
        self.channels = channels;
        self
    }

    #[must_use]
    pub fn with_dlm_scope(mut self, scope: DlmScope) -> Self {
        self.dlm_scope = scope;
        self
    }

    #[must_use]
    pub fn with_vif_params(mut self, params: VifParams) -> Self {
        self.vif = params;
        self
    }

    #[must_use]
    pub fn with_ssim_params(mut self, params: SsimParams) -> Self {
        self.ssim = params;
        self
    }

    #[must_use]
    pub fn with_strred_params(mut self, params: StrredParams) -> Self {
        self.strred = params;
        self
    }

    #[must_use]
    pub fn with_dlm_params(mut self, params: DlmParams) -> Self {
        self.dlm = params;
        self
    }

    /// Sets the viewing distance in picture heights (default 3).
    #[must_use]
    pub fn with_viewing_distance(mut self, distance: f64) -> Self {
        self.viewing_distance = distance;
        self
    }

    #[must_use]
    pub fn with_frame_count_policy(mut self, policy: FrameCountPolicy) -> Self {
        self.frame_count_policy = policy;
        self
    }

    /// Validates the parameters and resolves both schemas.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for out-of-range values,
    /// columns on channels that are not processed, or per-level DLM columns
    /// with a coarsest-level DLM scope.
    pub fn build(self) -> Result<PipelineConfig> {
        if self.levels == 0 || self.levels + self.vif_extra_levels > MAX_LEVELS {
            return Err(FunqueError::InvalidParameter {
                name: "levels",
                reason: format!(
                    "need 1 <= levels and levels + vif_extra_levels <= {MAX_LEVELS}, got {} + {}",
                    self.levels, self.vif_extra_levels
                ),
            });
        }
        if !(self.viewing_distance > 0.0 && self.viewing_distance.is_finite()) {
            return Err(FunqueError::InvalidParameter {
                name: "viewing_distance",
                reason: format!("must be positive, got {}", self.viewing_distance),
            });
        }
        self.vif.validate()?;
        self.ssim.validate()?;
        self.strred.validate()?;
        self.dlm.validate()?;

        let (features, scores) = resolve_schemas(self.variant, self.levels, self.vif_extra_levels);
        let processed = self.channels.channels();
        for spec in features.iter().chain(&scores) {
            if !processed.contains(&spec.channel) {
                return Err(FunqueError::InvalidParameter {
                    name: "channels",
                    reason: format!("column '{}' needs channel {:?}", spec.name, spec.channel),
                });
            }
            if matches!(spec.kind, FeatureKind::DlmLevel { .. })
                && self.dlm_scope != DlmScope::AllLevels
            {
                return Err(FunqueError::InvalidParameter {
                    name: "dlm_scope",
                    reason: format!("column '{}' needs the all-levels DLM scope", spec.name),
                });
            }
        }
        let stages: BTreeSet<Stage> = features.iter().chain(&scores).map(|f| f.kind.stage()).collect();

        Ok(PipelineConfig {
            variant: self.variant,
            wavelet: self.wavelet,
            levels: self.levels,
            vif_extra_levels: self.vif_extra_levels,
            resolution: self.resolution,
            size_policy: self.size_policy,
            csf: self.csf,
            channels: self.channels,
            dlm_scope: self.dlm_scope,
            vif: self.vif,
            ssim: self.ssim,
            strred: self.strred,
            dlm: self.dlm,
            viewing_distance: self.viewing_distance,
            frame_count_policy: self.frame_count_policy,
            features,
            scores,
            stages: stages.into_iter().collect(),
        })
    }
}

fn score(name: &str, kind: FeatureKind) -> FeatureSpec {
    FeatureSpec::new(format!("{SCORE_PREFIX}{name}_score"), Channel::Y, kind)
}

fn ms_ssim_scores(levels: usize) -> Vec<FeatureSpec> {
    (0..levels)
        .flat_map(|level| {
            Pooling::ALL
                .map(|pool| {
                    score(
                        &format!("ms_ssim_{}_scale{level}", pool.name()),
                        FeatureKind::MsSsim { pool, level },
                    )
                })
                .into_iter()
                .chain(std::iter::once(score(
                    &format!("strred_scale{level}"),
                    FeatureKind::Strred { level },
                )))
        })
        .collect()
}

/// Feature and score columns of a variant at depth `l`.
fn resolve_schemas(variant: Variant, l: usize, extra: usize) -> (Vec<FeatureSpec>, Vec<FeatureSpec>) {
    use Channel::{U, V, Y};
    use FeatureKind as K;

    let last = l - 1;
    let cov = Pooling::Cov;
    let f = |name: String, channel: Channel, kind: FeatureKind| FeatureSpec::new(name, channel, kind);

    match variant {
        Variant::Funque => {
            let mut features: Vec<FeatureSpec> = (0..l + extra)
                .map(|s| f(format!("vif_approx_scalar_channel_y_scale_{}", s + 1), Y, K::VifApprox { level: s }))
                .collect();
            features.push(f(format!("ssim_cov_channel_y_levels_{l}"), Y, K::Ssim { pool: cov }));
            features.push(f(format!("dlm_channel_y_scale_{l}"), Y, K::Dlm));
            let motion = K::Motion {
                stream: Stream::Reference,
                band: Band::Finest,
            };
            features.push(f(format!("motion_channel_y_scale_{l}"), Y, motion));

            let mut scores: Vec<FeatureSpec> = (0..l + extra)
                .map(|s| score(&format!("vif_scale{s}"), K::VifApprox { level: s }))
                .collect();
            scores.push(score("adm_scale0", K::Dlm));
            scores.push(score("ssim_mean_scale0", K::Ssim { pool: Pooling::Mean }));
            scores.push(score("ssim_cov_scale0", K::Ssim { pool: cov }));
            scores.push(score("mad_scale0", motion));
            (features, scores)
        }
        Variant::YFunquePlus | Variant::FsYFunquePlus => {
            let (prefix, stream) = if variant == Variant::YFunquePlus {
                ("mad_ref", Stream::Reference)
            } else {
                ("mad_dis", Stream::Distorted)
            };
            let features = vec![
                f(format!("ms_ssim_cov_channel_y_levels_{l}"), Y, K::MsSsim { pool: cov, level: last }),
                f(format!("dlm_channel_y_scale_{l}"), Y, K::Dlm),
                f(format!("strred_scalar_channel_y_levels_{l}"), Y, K::Strred { level: last }),
                f(
                    format!("{prefix}_channel_y_scale_{l}"),
                    Y,
                    K::Motion {
                        stream,
                        band: Band::Coarsest,
                    },
                ),
            ];
            let mut scores = vec![score("adm_scale0", K::Dlm)];
            scores.extend(ms_ssim_scores(l));
            (features, scores)
        }
        Variant::ThreeCFunquePlus => {
            let features = vec![
                f(format!("ms_ssim_cov_channel_y_levels_{l}"), Y, K::MsSsim { pool: cov, level: last }),
                f(format!("srred_scalar_channel_y_levels_{l}"), Y, K::Srred { level: last }),
                f(format!("trred_scalar_channel_y_levels_{l}"), Y, K::Trred { level: last }),
                f(format!("dlm_channel_y_scale_{l}"), Y, K::Dlm),
                f(
                    format!("mad_dis_channel_y_scale_{l}"),
                    Y,
                    K::Motion {
                        stream: Stream::Distorted,
                        band: Band::Coarsest,
                    },
                ),
                f(format!("edge_channel_u_scale_{l}"), U, K::Edge),
                f(format!("mad_channel_v_scale_{l}"), V, K::Mad),
            ];
            let scores = features.clone();
            (features, scores)
        }
        Variant::FsThreeCFunquePlus => {
            let features = vec![
                f(format!("ms_ssim_cov_channel_y_levels_{l}"), Y, K::MsSsim { pool: cov, level: last }),
                f(format!("dlm_channel_y_scale_{l}"), Y, K::Dlm),
                f(format!("sai_diff_channel_y_scale_{l}"), Y, K::SaiDiff),
                f(
                    format!("mad_dis_channel_u_scale_{l}"),
                    U,
                    K::Motion {
                        stream: Stream::Distorted,
                        band: Band::Coarsest,
                    },
                ),
                f(format!("srred_scalar_channel_u_levels_{l}"), U, K::Srred { level: last }),
                f(format!("trred_scalar_channel_u_levels_{l}"), U, K::Trred { level: last }),
                f(format!("edge_channel_u_scale_{l}"), U, K::Edge),
                f(format!("mad_channel_v_scale_{l}"), V, K::Mad),
                f(format!("blur_channel_v_scale_{l}"), V, K::Blur),
            ];
            let scores = features.clone();
            (features, scores)
        }
        Variant::VmafLike => {
            let motion = K::Motion {
                stream: Stream::Reference,
                band: Band::Finest,
            };
            let mut features = vec![
                f(format!("dlm_channel_y_levels_{l}"), Y, K::Dlm),
                f(format!("motion_channel_y_scale_{l}"), Y, motion),
            ];
            features.extend((0..l).map(|s| {
                f(format!("vif_approx_scalar_channel_y_scale_{}", s + 1), Y, K::VifApprox { level: s })
            }));

            let mut scores = vec![score("adm_score", K::Dlm)];
            scores.extend((0..l).map(|s| score(&format!("adm_scale{s}"), K::DlmLevel { level: s })));
            scores.push(score("mad_scale0", motion));
            scores.extend((0..l).map(|s| score(&format!("vif_scale{s}"), K::VifApprox { level: s })));
            (features, scores)
        }
    }
}
