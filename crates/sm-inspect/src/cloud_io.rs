//! Point cloud files: ASCII XYZ / CSV, and PLY in ASCII or binary
//! little-endian encoding.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use sm_core::{Point3, PointCloud};

/// Loads a cloud, choosing the parser by file extension (`.ply` or text).
pub fn load_cloud(path: &Path) -> Result<PointCloud> {
    let bytes = fs::read(path).with_context(|| format!("reading point cloud {}", path.display()))?;
    let is_ply = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("ply"));

    let parsed = if is_ply {
        parse_ply(&bytes)
    } else {
        std::str::from_utf8(&bytes)
            .context("point cloud text is not UTF-8")
            .and_then(parse_xyz)
    };
    let cloud = parsed.with_context(|| format!("parsing point cloud {}", path.display()))?;
    log::info!("loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

/// Writes one `x y z` line per point.
pub fn save_xyz(path: &Path, cloud: &PointCloud) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    for p in cloud.iter() {
        writeln!(w, "{} {} {}", p.x, p.y, p.z).context("writing point")?;
    }
    w.flush()
        .with_context(|| format!("writing point cloud {}", path.display()))
}

fn fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

/// One point per line from the first three numeric fields, separated by
/// whitespace, commas or semicolons. Blank lines, `#` comments and a
/// non-numeric first line (a CSV header) are skipped.
pub fn parse_xyz(text: &str) -> Result<PointCloud> {
    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed: Result<Vec<f64>, _> = fields(line).take(3).map(str::parse::<f64>).collect();
        match parsed {
            Ok(v) if v.len() == 3 => points.push(Point3::new(v[0], v[1], v[2])),
            Ok(v) => bail!("line {}: expected 3 coordinates, got {}", idx + 1, v.len()),
            Err(_) if points.is_empty() && idx == 0 => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("invalid float on line {}", idx + 1));
            }
        }
    }
    ensure!(!points.is_empty(), "no points found");
    Ok(PointCloud::new(points))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyScalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl PlyScalar {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            other => bail!("unknown ply property type {other}"),
        })
    }

    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Little-endian value at the start of `b`; `b` holds at least `size()` bytes.
    fn read_le(self, b: &[u8]) -> f64 {
        match self {
            Self::I8 => f64::from(b[0] as i8),
            Self::U8 => f64::from(b[0]),
            Self::I16 => f64::from(i16::from_le_bytes([b[0], b[1]])),
            Self::U16 => f64::from(u16::from_le_bytes([b[0], b[1]])),
            Self::I32 => f64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            Self::U32 => f64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            Self::F32 => f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            Self::F64 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        }
    }
}

struct PlyHeader {
    format: PlyFormat,
    vertex_count: usize,
    props: Vec<(PlyScalar, String)>,
}

impl PlyHeader {
    fn column(&self, name: &str) -> Result<usize> {
        self.props
            .iter()
            .position(|(_, p)| p == name)
            .with_context(|| format!("vertex property {name} is missing"))
    }
}

fn parse_ply_header(text: &str) -> Result<PlyHeader> {
    let mut lines = text.lines();
    ensure!(lines.next().map(str::trim) == Some("ply"), "missing ply magic line");

    let mut format = None;
    let mut vertex_count = None;
    let mut in_vertex = false;
    let mut props = Vec::new();
    for line in lines {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["format", "ascii", ..] => format = Some(PlyFormat::Ascii),
            ["format", "binary_little_endian", ..] => format = Some(PlyFormat::BinaryLittleEndian),
            ["format", other, ..] => bail!("unsupported ply format {other}"),
            ["element", "vertex", n, ..] => {
                in_vertex = true;
                vertex_count = Some(n.parse::<usize>().context("invalid vertex count")?);
            }
            ["element", ..] => {
                ensure!(vertex_count.is_some(), "the vertex element must come first");
                in_vertex = false;
            }
            ["property", "list", ..] if in_vertex => bail!("list properties on vertices are not supported"),
            ["property", ty, name] if in_vertex => props.push((PlyScalar::parse(ty)?, name.to_string())),
            _ => {}
        }
    }

    Ok(PlyHeader {
        format: format.context("ply header without format line")?,
        vertex_count: vertex_count.context("no vertex element in header")?,
        props,
    })
}

/// PLY whose first element is `vertex` with `x`, `y` and `z` properties, in
/// ASCII or binary little-endian encoding. Other properties and elements are
/// ignored.
pub fn parse_ply(bytes: &[u8]) -> Result<PointCloud> {
    const END: &[u8] = b"end_header";
    let end = bytes
        .windows(END.len())
        .position(|w| w == END)
        .context("ply header has no end_header line")?;
    let body_start = bytes[end..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |i| end + i + 1);

    let header_text = std::str::from_utf8(&bytes[..end]).context("ply header is not text")?;
    let header = parse_ply_header(header_text)?;
    let cols = [header.column("x")?, header.column("y")?, header.column("z")?];
    let body = &bytes[body_start..];

    let points = match header.format {
        PlyFormat::Ascii => ascii_vertices(body, &header, cols)?,
        PlyFormat::BinaryLittleEndian => binary_vertices(body, &header, cols)?,
    };
    Ok(PointCloud::new(points))
}

fn ascii_vertices(body: &[u8], header: &PlyHeader, [ix, iy, iz]: [usize; 3]) -> Result<Vec<Point3>> {
    let text = std::str::from_utf8(body).context("ascii ply body is not text")?;
    let n = header.vertex_count;

    let mut points = Vec::with_capacity(n);
    for (i, line) in text.lines().take(n).enumerate() {
        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("invalid float in vertex {i}"))?;
        ensure!(
            values.len() >= header.props.len(),
            "vertex {i}: expected {} values, got {}",
            header.props.len(),
            values.len()
        );
        points.push(Point3::new(values[ix], values[iy], values[iz]));
    }
    ensure!(points.len() == n, "expected {n} vertices, found {}", points.len());
    Ok(points)
}

fn binary_vertices(body: &[u8], header: &PlyHeader, cols: [usize; 3]) -> Result<Vec<Point3>> {
    let mut offsets = Vec::with_capacity(header.props.len());
    let mut stride = 0;
    for (ty, _) in &header.props {
        offsets.push(stride);
        stride += ty.size();
    }
    let n = header.vertex_count;
    let needed = stride * n;
    ensure!(
        body.len() >= needed,
        "binary ply body holds {} bytes, {n} vertices need {needed}",
        body.len()
    );

    let read = |record: &[u8], col: usize| header.props[col].0.read_le(&record[offsets[col]..]);
    Ok(body[..needed]
        .chunks_exact(stride)
        .map(|r| Point3::new(read(r, cols[0]), read(r, cols[1]), read(r, cols[2])))
        .collect())
}
