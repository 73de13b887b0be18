use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use plotdxf_core::{
    document::{
        BoundaryLoop, Document, Entity, EntityId, FilledRegion, Layer, Polyline, Text,
    },
    geometry::Point2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write DXF stream: {0}")]
    Stream(#[source] io::Error),
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 实体句柄的起始值；较小的句柄留给表、块与字典。
const ENTITY_HANDLE_BASE: u64 = 0x100;

const BLOCK_RECORD_TABLE_HANDLE: u64 = 0x1;
const LAYER_TABLE_HANDLE: u64 = 0x2;
const STYLE_TABLE_HANDLE: u64 = 0x3;
const LTYPE_TABLE_HANDLE: u64 = 0x5;
const ROOT_DICTIONARY_HANDLE: u64 = 0xC;
const GROUP_DICTIONARY_HANDLE: u64 = 0xD;
const STANDARD_STYLE_HANDLE: u64 = 0x11;
const LINETYPES: [(&str, u64); 3] = [("ByBlock", 0x14), ("ByLayer", 0x15), ("Continuous", 0x16)];
const PAPER_SPACE: BlockHandles = BlockHandles {
    name: "*Paper_Space",
    record: 0x1B,
    begin: 0x1C,
    end: 0x1D,
};
const MODEL_SPACE: BlockHandles = BlockHandles {
    name: "*Model_Space",
    record: 0x1F,
    begin: 0x20,
    end: 0x21,
};

struct BlockHandles {
    name: &'static str,
    record: u64,
    begin: u64,
    end: u64,
}

/// 一次写出的句柄分配：实体为 `0x100 + 编号`，图层紧跟在最后一个实体之后。
#[derive(Debug, Clone, Copy)]
struct HandlePlan {
    layer_base: u64,
    seed: u64,
}

impl HandlePlan {
    fn for_document(document: &Document) -> Self {
        let layer_base = document
            .entities()
            .map(|(id, _)| entity_handle(*id) + 1)
            .max()
            .unwrap_or(ENTITY_HANDLE_BASE);
        Self {
            layer_base,
            seed: layer_base + document.layers().count() as u64,
        }
    }

    #[inline]
    fn layer(&self, index: usize) -> u64 {
        self.layer_base + index as u64
    }
}

/// ASCII DXF 写出器。
#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 校验文档后写出完整的 DXF 文本。校验失败时不会写入任何内容。
    pub fn write_to<W: Write>(&self, document: &Document, writer: W) -> Result<(), IoError> {
        validate(document)?;
        let mut out = DxfWriter::new(writer);
        out.document(document).map_err(IoError::Stream)
    }

    pub fn to_dxf_string(&self, document: &Document) -> Result<String, IoError> {
        let mut buffer = Vec::new();
        self.write_to(document, &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| IoError::InvalidDocument(err.to_string()))
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let text = self.to_dxf_string(document)?;
        fs::write(path, text).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// 由实体编号推导 DXF 句柄。
#[inline]
pub fn entity_handle(id: EntityId) -> u64 {
    ENTITY_HANDLE_BASE + id.get()
}

fn validate(document: &Document) -> Result<(), IoError> {
    let extents = document.extents();
    if !is_finite_point(extents.min()) || !is_finite_point(extents.max()) {
        return Err(IoError::InvalidDocument(
            "文档范围包含非有限坐标".to_string(),
        ));
    }
    for (id, entity) in document.entities() {
        let finite = match entity {
            Entity::Polyline(polyline) => polyline.vertices.iter().copied().all(is_finite_point),
            Entity::FilledRegion(region) => region
                .loops
                .iter()
                .flat_map(|boundary| boundary.vertices.iter().copied())
                .all(is_finite_point),
            Entity::Text(text) => {
                is_finite_point(text.insert) && text.height.is_finite() && text.rotation.is_finite()
            }
        };
        if !finite {
            return Err(IoError::InvalidDocument(format!(
                "实体 {} 包含非有限数值",
                id.get()
            )));
        }
        if let Entity::FilledRegion(region) = entity {
            for source in region.associated_sources() {
                if !matches!(document.entity(source), Some(Entity::Polyline(_))) {
                    return Err(IoError::InvalidDocument(format!(
                        "填充 {} 关联的边界 {} 不是多段线",
                        id.get(),
                        source.get()
                    )));
                }
            }
        }
    }
    Ok(())
}

#[inline]
fn is_finite_point(point: Point2) -> bool {
    point.x().is_finite() && point.y().is_finite()
}

struct DxfWriter<W: Write> {
    out: W,
}

impl<W: Write> DxfWriter<W> {
    fn new(out: W) -> Self {
        Self { out }
    }

    fn pair(&mut self, code: i32, value: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.out, "{code:>3}")?;
        writeln!(self.out, "{value}")
    }

    fn real(&mut self, code: i32, value: f64) -> io::Result<()> {
        self.pair(code, format_args!("{value:.6}"))
    }

    fn handle(&mut self, code: i32, handle: u64) -> io::Result<()> {
        self.pair(code, format_args!("{handle:X}"))
    }

    fn point(&mut self, code: i32, point: Point2) -> io::Result<()> {
        self.real(code, point.x())?;
        self.real(code + 10, point.y())
    }

    fn document(&mut self, document: &Document) -> io::Result<()> {
        let plan = HandlePlan::for_document(document);
        self.header(document, &plan)?;
        self.tables(document, &plan)?;
        self.blocks()?;
        self.entities(document)?;
        self.objects()?;
        self.pair(0, "EOF")?;
        self.out.flush()
    }

    fn header(&mut self, document: &Document, plan: &HandlePlan) -> io::Result<()> {
        let extents = document.extents();
        self.pair(0, "SECTION")?;
        self.pair(2, "HEADER")?;
        self.pair(9, "$ACADVER")?;
        self.pair(1, document.version().tag())?;
        self.pair(9, "$HANDSEED")?;
        self.handle(5, plan.seed)?;
        self.pair(9, "$EXTMIN")?;
        self.point(10, extents.min())?;
        self.real(30, 0.0)?;
        self.pair(9, "$EXTMAX")?;
        self.point(10, extents.max())?;
        self.real(30, 0.0)?;
        self.pair(0, "ENDSEC")
    }

    fn tables(&mut self, document: &Document, plan: &HandlePlan) -> io::Result<()> {
        let layers: Vec<&Layer> = document.layers().collect();

        self.pair(0, "SECTION")?;
        self.pair(2, "TABLES")?;

        self.table_start("LTYPE", LTYPE_TABLE_HANDLE, LINETYPES.len())?;
        for (name, handle) in LINETYPES {
            self.table_record("LTYPE", handle, LTYPE_TABLE_HANDLE, "AcDbLinetypeTableRecord", name)?;
            self.pair(70, 0)?;
            self.pair(3, "")?;
            self.pair(72, 65)?;
            self.pair(73, 0)?;
            self.real(40, 0.0)?;
        }
        self.pair(0, "ENDTAB")?;

        self.table_start("LAYER", LAYER_TABLE_HANDLE, layers.len())?;
        for (index, layer) in layers.iter().enumerate() {
            self.table_record(
                "LAYER",
                plan.layer(index),
                LAYER_TABLE_HANDLE,
                "AcDbLayerTableRecord",
                &layer.name,
            )?;
            self.pair(70, 0)?;
            self.pair(62, 7)?;
            self.pair(6, "Continuous")?;
        }
        self.pair(0, "ENDTAB")?;

        self.table_start("STYLE", STYLE_TABLE_HANDLE, 1)?;
        self.table_record(
            "STYLE",
            STANDARD_STYLE_HANDLE,
            STYLE_TABLE_HANDLE,
            "AcDbTextStyleTableRecord",
            "Standard",
        )?;
        self.pair(70, 0)?;
        self.real(40, 0.0)?;
        self.real(41, 1.0)?;
        self.real(50, 0.0)?;
        self.pair(71, 0)?;
        self.real(42, 2.5)?;
        self.pair(3, "txt")?;
        self.pair(4, "")?;
        self.pair(0, "ENDTAB")?;

        self.table_start("BLOCK_RECORD", BLOCK_RECORD_TABLE_HANDLE, 2)?;
        for block in [&MODEL_SPACE, &PAPER_SPACE] {
            self.table_record(
                "BLOCK_RECORD",
                block.record,
                BLOCK_RECORD_TABLE_HANDLE,
                "AcDbBlockTableRecord",
                block.name,
            )?;
        }
        self.pair(0, "ENDTAB")?;

        self.pair(0, "ENDSEC")
    }

    fn table_start(&mut self, name: &str, handle: u64, count: usize) -> io::Result<()> {
        self.pair(0, "TABLE")?;
        self.pair(2, name)?;
        self.handle(5, handle)?;
        self.handle(330, 0)?;
        self.pair(100, "AcDbSymbolTable")?;
        self.pair(70, count)
    }

    fn table_record(
        &mut self,
        kind: &str,
        handle: u64,
        owner: u64,
        subclass: &str,
        name: &str,
    ) -> io::Result<()> {
        self.pair(0, kind)?;
        self.handle(5, handle)?;
        self.handle(330, owner)?;
        self.pair(100, "AcDbSymbolTableRecord")?;
        self.pair(100, subclass)?;
        self.pair(2, name)
    }

    /// 模型空间与图纸空间的空块定义。
    fn blocks(&mut self) -> io::Result<()> {
        self.pair(0, "SECTION")?;
        self.pair(2, "BLOCKS")?;
        for block in [&MODEL_SPACE, &PAPER_SPACE] {
            let paper = block.record == PAPER_SPACE.record;
            self.pair(0, "BLOCK")?;
            self.handle(5, block.begin)?;
            self.handle(330, block.record)?;
            self.pair(100, "AcDbEntity")?;
            if paper {
                self.pair(67, 1)?;
            }
            self.pair(8, "0")?;
            self.pair(100, "AcDbBlockBegin")?;
            self.pair(2, block.name)?;
            self.pair(70, 0)?;
            self.point(10, Point2::new(0.0, 0.0))?;
            self.real(30, 0.0)?;
            self.pair(3, block.name)?;
            self.pair(1, "")?;
            self.pair(0, "ENDBLK")?;
            self.handle(5, block.end)?;
            self.handle(330, block.record)?;
            self.pair(100, "AcDbEntity")?;
            if paper {
                self.pair(67, 1)?;
            }
            self.pair(8, "0")?;
            self.pair(100, "AcDbBlockEnd")?;
        }
        self.pair(0, "ENDSEC")
    }

    /// 根字典与空的 ACAD_GROUP 字典。
    fn objects(&mut self) -> io::Result<()> {
        self.pair(0, "SECTION")?;
        self.pair(2, "OBJECTS")?;
        self.pair(0, "DICTIONARY")?;
        self.handle(5, ROOT_DICTIONARY_HANDLE)?;
        self.handle(330, 0)?;
        self.pair(100, "AcDbDictionary")?;
        self.pair(281, 1)?;
        self.pair(3, "ACAD_GROUP")?;
        self.handle(350, GROUP_DICTIONARY_HANDLE)?;
        self.pair(0, "DICTIONARY")?;
        self.handle(5, GROUP_DICTIONARY_HANDLE)?;
        self.handle(330, ROOT_DICTIONARY_HANDLE)?;
        self.pair(100, "AcDbDictionary")?;
        self.pair(281, 1)?;
        self.pair(0, "ENDSEC")
    }

    fn entities(&mut self, document: &Document) -> io::Result<()> {
        self.pair(0, "SECTION")?;
        self.pair(2, "ENTITIES")?;
        for (id, entity) in document.entities() {
            match entity {
                Entity::Polyline(polyline) => {
                    let reactors = document.regions_associated_with(*id);
                    self.polyline(*id, polyline, &reactors)?
                }
                Entity::FilledRegion(region) => self.filled_region(*id, region)?,
                Entity::Text(text) => self.text(*id, text)?,
            }
        }
        self.pair(0, "ENDSEC")
    }

    fn entity_common(
        &mut self,
        kind: &str,
        id: EntityId,
        reactors: &[EntityId],
        layer: &str,
        color: u8,
    ) -> io::Result<()> {
        self.pair(0, kind)?;
        self.handle(5, entity_handle(id))?;
        // 被关联填充引用的边界需要反向记录这些填充。
        if !reactors.is_empty() {
            self.pair(102, "{ACAD_REACTORS")?;
            for reactor in reactors {
                self.handle(330, entity_handle(*reactor))?;
            }
            self.pair(102, "}")?;
        }
        self.handle(330, MODEL_SPACE.record)?;
        self.pair(100, "AcDbEntity")?;
        self.pair(8, layer)?;
        self.pair(62, color)
    }

    fn polyline(&mut self, id: EntityId, polyline: &Polyline, reactors: &[EntityId]) -> io::Result<()> {
        self.entity_common("LWPOLYLINE", id, reactors, &polyline.layer, polyline.color.get())?;
        self.pair(100, "AcDbPolyline")?;
        self.pair(90, polyline.vertices.len())?;
        self.pair(70, i32::from(polyline.is_closed))?;
        for vertex in &polyline.vertices {
            self.point(10, *vertex)?;
        }
        Ok(())
    }

    fn filled_region(&mut self, id: EntityId, region: &FilledRegion) -> io::Result<()> {
        self.entity_common("HATCH", id, &[], &region.layer, region.color.get())?;
        self.pair(100, "AcDbHatch")?;
        self.point(10, Point2::new(0.0, 0.0))?;
        self.real(30, 0.0)?;
        self.real(210, 0.0)?;
        self.real(220, 0.0)?;
        self.real(230, 1.0)?;
        self.pair(2, "SOLID")?;
        self.pair(70, 1)?;
        self.pair(71, i32::from(region.is_associative()))?;
        self.pair(91, region.loops.len())?;
        for boundary in &region.loops {
            self.boundary_loop(boundary)?;
        }
        self.pair(75, 0)?;
        self.pair(76, 1)?;
        self.pair(98, 0)
    }

    fn boundary_loop(&mut self, boundary: &BoundaryLoop) -> io::Result<()> {
        // 2 = 多段线边界；关联边界额外带上 1（外部边界）。
        let path_type = if boundary.source.is_some() { 3 } else { 2 };
        self.pair(92, path_type)?;
        self.pair(72, 0)?;
        self.pair(73, i32::from(boundary.is_closed))?;
        self.pair(93, boundary.vertices.len())?;
        for vertex in &boundary.vertices {
            self.point(10, *vertex)?;
        }
        match boundary.source {
            Some(source) => {
                self.pair(97, 1)?;
                self.handle(330, entity_handle(source))
            }
            None => self.pair(97, 0),
        }
    }

    fn text(&mut self, id: EntityId, text: &Text) -> io::Result<()> {
        let (horizontal, vertical) = text.alignment.dxf_flags();
        self.entity_common("TEXT", id, &[], &text.layer, text.color.get())?;
        self.pair(100, "AcDbText")?;
        self.point(10, text.insert)?;
        self.real(30, 0.0)?;
        self.real(40, text.height)?;
        self.pair(1, &text.content)?;
        self.real(50, text.rotation)?;
        if horizontal != 0 {
            self.pair(72, horizontal)?;
        }
        if text.alignment.uses_alignment_point() {
            self.point(11, text.insert)?;
            self.real(31, 0.0)?;
        }
        self.pair(100, "AcDbText")?;
        if vertical != 0 {
            self.pair(73, vertical)?;
        }
        Ok(())
    }
}
