//! Frame sources: asset description, video standards and decoders for
//! Y4M and raw planar YUV files.
//!
//! Samples are normalized to `[0, 1]` by dividing by the range
//! `2^bit_depth - 1`. Raw YUV takes the bit depth from the declared standard,
//! Y4M from its header. Chroma planes keep their subsampled size.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

#[cfg(feature = "y4m")]
use tracing::debug;

use crate::image::{Frame, Plane};
use crate::{Dimensions, FunqueError, Result};

/// Chroma subsampling of a planar YUV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ChromaSampling {
    /// Half width, half height.
    #[default]
    Cs420,
    /// Half width, full height.
    Cs422,
    /// No subsampling.
    Cs444,
    /// Luma only.
    Monochrome,
}

impl ChromaSampling {
    /// Chroma plane size for a luma size, or `None` without chroma.
    #[must_use]
    pub fn chroma_size(self, width: usize, height: usize) -> Option<(usize, usize)> {
        match self {
            ChromaSampling::Cs420 => Some((width.div_ceil(2), height.div_ceil(2))),
            ChromaSampling::Cs422 => Some((width.div_ceil(2), height)),
            ChromaSampling::Cs444 => Some((width, height)),
            ChromaSampling::Monochrome => None,
        }
    }
}

impl std::str::FromStr for ChromaSampling {
    type Err = FunqueError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "420" | "yuv420p" => Ok(ChromaSampling::Cs420),
            "422" | "yuv422p" => Ok(ChromaSampling::Cs422),
            "444" | "yuv444p" => Ok(ChromaSampling::Cs444),
            "400" | "mono" | "gray" => Ok(ChromaSampling::Monochrome),
            _ => Err(FunqueError::InvalidParameter {
                name: "chroma",
                reason: format!("unknown chroma sampling '{s}'"),
            }),
        }
    }
}

/// Sample format of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VideoStandard {
    /// Bits per sample, 8 to 16.
    pub bit_depth: u32,
    /// Chroma layout.
    pub chroma: ChromaSampling,
}

impl Default for VideoStandard {
    fn default() -> Self {
        Self {
            bit_depth: 8,
            chroma: ChromaSampling::Cs420,
        }
    }
}

impl VideoStandard {
    /// Largest sample value.
    #[must_use]
    pub fn range(&self) -> f64 {
        ((1u64 << self.bit_depth) - 1) as f64
    }

    /// Bytes per stored sample: 1 up to 8 bits, 2 (little endian) above.
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        if self.bit_depth > 8 {
            2
        } else {
            1
        }
    }

    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] outside 8 to 16 bits.
    pub fn validate(&self) -> Result<()> {
        if (8..=16).contains(&self.bit_depth) {
            Ok(())
        } else {
            Err(FunqueError::InvalidParameter {
                name: "bit_depth",
                reason: format!("must be between 8 and 16, got {}", self.bit_depth),
            })
        }
    }
}

/// One input stream.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StreamSpec {
    pub path: PathBuf,
    pub standard: VideoStandard,
    /// Declared luma width.
    pub width: usize,
    /// Declared luma height.
    pub height: usize,
}

impl StreamSpec {
    /// 8-bit 4:2:0 stream of the given size.
    pub fn new(path: impl Into<PathBuf>, width: usize, height: usize) -> Self {
        Self {
            path: path.into(),
            standard: VideoStandard::default(),
            width,
            height,
        }
    }

    #[must_use]
    pub fn with_standard(mut self, standard: VideoStandard) -> Self {
        self.standard = standard;
        self
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Reads size, bit depth and chroma layout from a Y4M header.
    ///
    /// # Errors
    /// Returns [`FunqueError::Io`] if the file or its header cannot be read.
    #[cfg(feature = "y4m")]
    pub fn probe_y4m(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| io_error(&path, e))?;
        let decoder = y4m::decode(BufReader::new(file)).map_err(|e| y4m_error(&path, e))?;
        let standard = VideoStandard {
            bit_depth: decoder.get_bit_depth() as u32,
            chroma: colorspace_sampling(decoder.get_colorspace()),
        };
        Ok(Self {
            width: decoder.get_width(),
            height: decoder.get_height(),
            standard,
            path,
        })
    }

    /// Whether the path has a `.y4m` extension.
    #[must_use]
    pub fn is_y4m(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("y4m"))
    }

    /// Opens the stream as an iterator of normalized frames.
    ///
    /// `.y4m` files go through the Y4M decoder; anything else is read as
    /// headerless planar YUV.
    ///
    /// # Errors
    /// Returns [`FunqueError::Io`] if the file cannot be opened, or
    /// [`FunqueError::DimensionMismatch`] if a Y4M header disagrees with the
    /// declared size.
    pub fn open(&self) -> Result<Box<dyn Iterator<Item = Result<Frame>> + Send>> {
        self.standard.validate()?;
        if self.is_y4m() {
            #[cfg(feature = "y4m")]
            {
                return Ok(Box::new(Y4mSource::open(self)?));
            }
            #[cfg(not(feature = "y4m"))]
            {
                return Err(FunqueError::InvalidParameter {
                    name: "path",
                    reason: format!(
                        "'{}' is a Y4M file but the y4m feature is disabled",
                        self.path.display()
                    ),
                });
            }
        }
        Ok(Box::new(RawYuvSource::open(self)?))
    }
}

/// A reference/distorted pair and where its tables go.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Asset {
    pub reference: StreamSpec,
    pub distorted: StreamSpec,
    /// Keep every n-th frame; `None` keeps all.
    pub sample_interval: Option<usize>,
    /// Feature matrix destination.
    pub feature_table: Option<PathBuf>,
    /// Raw score table destination.
    pub score_table: Option<PathBuf>,
    /// Timing table destination.
    pub timing_table: Option<PathBuf>,
}

impl Asset {
    pub fn new(reference: StreamSpec, distorted: StreamSpec) -> Self {
        Self {
            reference,
            distorted,
            sample_interval: None,
            feature_table: None,
            score_table: None,
            timing_table: None,
        }
    }

    #[must_use]
    pub fn with_sample_interval(mut self, interval: usize) -> Self {
        self.sample_interval = Some(interval);
        self
    }

    /// Effective sample interval (at least 1).
    #[must_use]
    pub fn interval(&self) -> usize {
        self.sample_interval.unwrap_or(1).max(1)
    }
}

fn io_error(path: &Path, source: io::Error) -> FunqueError {
    FunqueError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Converts packed samples into a normalized plane.
fn plane_from_bytes(
    bytes: &[u8],
    width: usize,
    height: usize,
    bytes_per_sample: usize,
    range: f64,
) -> Result<Plane> {
    if bytes_per_sample == 1 {
        Plane::from_samples(bytes, width, height, range)
    } else {
        let samples: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        Plane::from_samples(&samples, width, height, range)
    }
}

/// Headerless planar YUV reader.
pub struct RawYuvSource {
    reader: BufReader<File>,
    path: PathBuf,
    width: usize,
    height: usize,
    chroma: Option<(usize, usize)>,
    bytes_per_sample: usize,
    range: f64,
    buffer: Vec<u8>,
}

impl RawYuvSource {
    /// # Errors
    /// Returns [`FunqueError::Io`] if the file cannot be opened.
    pub fn open(spec: &StreamSpec) -> Result<Self> {
        let file = File::open(&spec.path).map_err(|e| io_error(&spec.path, e))?;
        let chroma = spec.standard.chroma.chroma_size(spec.width, spec.height);
        let bytes_per_sample = spec.standard.bytes_per_sample();
        let samples = spec.width * spec.height + chroma.map_or(0, |(w, h)| 2 * w * h);
        Ok(Self {
            reader: BufReader::new(file),
            path: spec.path.clone(),
            width: spec.width,
            height: spec.height,
            chroma,
            bytes_per_sample,
            range: spec.standard.range(),
            buffer: vec![0; samples * bytes_per_sample],
        })
    }

    /// Fills the frame buffer; returns the number of bytes read.
    fn fill(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn decode(&self) -> Result<Frame> {
        let bps = self.bytes_per_sample;
        let luma_bytes = self.width * self.height * bps;
        let y = plane_from_bytes(
            &self.buffer[..luma_bytes],
            self.width,
            self.height,
            bps,
            self.range,
        )?;
        let Some((cw, ch)) = self.chroma else {
            return Ok(Frame::luma(y));
        };
        let chroma_bytes = cw * ch * bps;
        let u = plane_from_bytes(
            &self.buffer[luma_bytes..luma_bytes + chroma_bytes],
            cw,
            ch,
            bps,
            self.range,
        )?;
        let v = plane_from_bytes(&self.buffer[luma_bytes + chroma_bytes..], cw, ch, bps, self.range)?;
        Ok(Frame::yuv(y, u, v))
    }
}

impl Iterator for RawYuvSource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.fill() {
            Ok(0) => None,
            Ok(n) if n < self.buffer.len() => {
                let rows = n / (self.width * self.bytes_per_sample).max(1);
                Some(Err(FunqueError::DimensionMismatch {
                    expected: Dimensions::new(self.width, self.height),
                    actual: Dimensions::new(self.width, rows.min(self.height)),
                }))
            }
            Ok(_) => Some(self.decode()),
            Err(e) => Some(Err(io_error(&self.path, e))),
        }
    }
}

/// YUV4MPEG2 reader.
#[cfg(feature = "y4m")]
pub struct Y4mSource {
    decoder: y4m::Decoder<BufReader<File>>,
    path: PathBuf,
    width: usize,
    height: usize,
    chroma: Option<(usize, usize)>,
    bytes_per_sample: usize,
    range: f64,
}

#[cfg(feature = "y4m")]
impl Y4mSource {
    /// Opens a Y4M file and checks its header against the declared size.
    ///
    /// Sample width and normalization range follow the header bit depth.
    ///
    /// # Errors
    /// Returns [`FunqueError::Io`] for unreadable files or headers and
    /// [`FunqueError::DimensionMismatch`] for a size disagreement.
    pub fn open(spec: &StreamSpec) -> Result<Self> {
        let file = File::open(&spec.path).map_err(|e| io_error(&spec.path, e))?;
        let decoder = y4m::decode(BufReader::new(file)).map_err(|e| y4m_error(&spec.path, e))?;
        let (width, height) = (decoder.get_width(), decoder.get_height());
        if width != spec.width || height != spec.height {
            return Err(FunqueError::DimensionMismatch {
                expected: spec.dimensions(),
                actual: Dimensions::new(width, height),
            });
        }
        let header = VideoStandard {
            bit_depth: decoder.get_bit_depth() as u32,
            chroma: colorspace_sampling(decoder.get_colorspace()),
        };
        header.validate()?;
        if header.bit_depth != spec.standard.bit_depth {
            debug!(
                "{}: header bit depth {} overrides declared {}",
                spec.path.display(),
                header.bit_depth,
                spec.standard.bit_depth
            );
        }
        let chroma = header.chroma.chroma_size(width, height);
        let bytes_per_sample = decoder.get_bytes_per_sample();
        Ok(Self {
            decoder,
            path: spec.path.clone(),
            width,
            height,
            chroma,
            bytes_per_sample,
            range: header.range(),
        })
    }
}

#[cfg(feature = "y4m")]
fn colorspace_sampling(colorspace: y4m::Colorspace) -> ChromaSampling {
    use y4m::Colorspace;
    match colorspace {
        Colorspace::Cmono => ChromaSampling::Monochrome,
        Colorspace::C422 | Colorspace::C422p10 | Colorspace::C422p12 => ChromaSampling::Cs422,
        Colorspace::C444 | Colorspace::C444p10 | Colorspace::C444p12 => ChromaSampling::Cs444,
        _ => ChromaSampling::Cs420,
    }
}

#[cfg(feature = "y4m")]
fn y4m_error(path: &Path, error: y4m::Error) -> FunqueError {
    let source = match error {
        y4m::Error::IoError(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    };
    io_error(path, source)
}

#[cfg(feature = "y4m")]
impl Iterator for Y4mSource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let (width, height, chroma, bps, range) = (
            self.width,
            self.height,
            self.chroma,
            self.bytes_per_sample,
            self.range,
        );
        let frame = match self.decoder.read_frame() {
            Ok(frame) => frame,
            Err(y4m::Error::EOF) => return None,
            Err(e) => return Some(Err(y4m_error(&self.path, e))),
        };
        let decoded = (|| {
            let y = plane_from_bytes(frame.get_y_plane(), width, height, bps, range)?;
            let Some((cw, ch)) = chroma else {
                return Ok(Frame::luma(y));
            };
            let u = plane_from_bytes(frame.get_u_plane(), cw, ch, bps, range)?;
            let v = plane_from_bytes(frame.get_v_plane(), cw, ch, bps, range)?;
            Ok(Frame::yuv(y, u, v))
        })();
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Channel;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("funque-source-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_standard_range() {
        assert_eq!(VideoStandard::default().range(), 255.0);
        let ten = VideoStandard {
            bit_depth: 10,
            chroma: ChromaSampling::Cs420,
        };
        assert_eq!(ten.range(), 1023.0);
        assert_eq!(ten.bytes_per_sample(), 2);
        assert!(VideoStandard {
            bit_depth: 4,
            chroma: ChromaSampling::Cs444
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_chroma_sizes() {
        assert_eq!(ChromaSampling::Cs420.chroma_size(5, 3), Some((3, 2)));
        assert_eq!(ChromaSampling::Cs422.chroma_size(4, 4), Some((2, 4)));
        assert_eq!(ChromaSampling::Monochrome.chroma_size(4, 4), None);
        assert_eq!("444".parse::<ChromaSampling>().unwrap(), ChromaSampling::Cs444);
    }

    #[test]
    fn test_raw_yuv_frames() {
        let path = temp_path("frames.yuv");
        {
            let mut f = File::create(&path).unwrap();
            // Two 4x2 4:2:0 frames: 8 luma + 2 + 2 chroma bytes each.
            for frame in 0..2u8 {
                f.write_all(&[frame * 100; 8]).unwrap();
                f.write_all(&[128; 4]).unwrap();
            }
        }
        let spec = StreamSpec::new(&path, 4, 2);
        let frames: Vec<Frame> = spec.open().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].plane(Channel::Y).unwrap().get(3, 1), 100.0 / 255.0);
        assert_eq!(frames[0].plane(Channel::U).unwrap().width(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_raw_yuv_partial_frame() {
        let path = temp_path("partial.yuv");
        std::fs::write(&path, [0u8; 12 + 5]).unwrap();
        let spec = StreamSpec::new(&path, 4, 2);
        let results: Vec<_> = spec.open().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(FunqueError::DimensionMismatch { .. })
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let spec = StreamSpec::new("/nonexistent/funque/input.yuv", 4, 4);
        assert!(matches!(spec.open(), Err(FunqueError::Io { .. })));
    }

    #[cfg(feature = "y4m")]
    #[test]
    fn test_y4m_header_checked() {
        let path = temp_path("header.y4m");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(b"YUV4MPEG2 W4 H2 F25:1 Ip A1:1 C444\n").unwrap();
            f.write_all(b"FRAME\n").unwrap();
            f.write_all(&[255; 24]).unwrap();
        }
        let frames: Vec<Frame> = StreamSpec::new(&path, 4, 2)
            .open()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].plane(Channel::V).unwrap().width(), 4);
        assert_eq!(frames[0].plane(Channel::Y).unwrap().get(0, 0), 1.0);

        assert!(matches!(
            StreamSpec::new(&path, 8, 2).open().map(|_| ()),
            Err(FunqueError::DimensionMismatch { .. })
        ));

        let probed = StreamSpec::probe_y4m(&path).unwrap();
        assert_eq!((probed.width, probed.height), (4, 2));
        assert_eq!(probed.standard.chroma, ChromaSampling::Cs444);
        assert_eq!(probed.standard.bit_depth, 8);
        std::fs::remove_file(&path).ok();
    }

    #[cfg(feature = "y4m")]
    #[test]
    fn test_y4m_high_bit_depth_uses_header_range() {
        let path = temp_path("ten_bit.y4m");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(b"YUV4MPEG2 W16 H16 F25:1 Ip A1:1 C420p10\n").unwrap();
            f.write_all(b"FRAME\n").unwrap();
            // 1023 little endian for luma, 512 for both chroma planes.
            for _ in 0..16 * 16 {
                f.write_all(&1023u16.to_le_bytes()).unwrap();
            }
            for _ in 0..2 * 8 * 8 {
                f.write_all(&512u16.to_le_bytes()).unwrap();
            }
        }

        // Declared as the default 8-bit standard; the header wins.
        let frames: Vec<Frame> = StreamSpec::new(&path, 16, 16)
            .open()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 1);
        let y = frames[0].plane(Channel::Y).unwrap();
        assert!(y.data().iter().all(|&v| v == 1.0));
        let u = frames[0].plane(Channel::U).unwrap();
        assert_eq!(u.width(), 8);
        assert_eq!(u.get(0, 0), 512.0 / 1023.0);

        let probed = StreamSpec::probe_y4m(&path).unwrap();
        assert_eq!(probed.standard.bit_depth, 10);
        let probed_frames: Vec<Frame> = probed.open().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(probed_frames[0].plane(Channel::Y).unwrap().data(), y.data());
        std::fs::remove_file(&path).ok();
    }
}
