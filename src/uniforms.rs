// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

//! CPU staging of the WGSL `Params` uniform struct each compute pass declares.
//!
//! Layouts normally come from the shader itself (see `reflect`); `UniformLayout::new`
//! packs a host field list with the same WGSL alignment rules.

use crate::error::UniformBindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    I32,
    U32,
    Vec2,
    Vec3,
}

impl UniformKind {
    fn align(self) -> usize {
        match self {
            UniformKind::F32 | UniformKind::I32 | UniformKind::U32 => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 16,
        }
    }

    fn size(self) -> usize {
        match self {
            UniformKind::F32 | UniformKind::I32 | UniformKind::U32 => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
        }
    }

    pub fn wgsl_name(self) -> &'static str {
        match self {
            UniformKind::F32 => "f32",
            UniformKind::I32 => "i32",
            UniformKind::U32 => "u32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec3 => "vec3<f32>",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UniformField {
    pub name: &'static str,
    pub kind: UniformKind,
}

impl UniformField {
    pub const fn new(name: &'static str, kind: UniformKind) -> Self {
        Self { name, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    U32(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

impl UniformValue {
    fn kind_name(&self) -> &'static str {
        match self {
            UniformValue::F32(_) => "f32",
            UniformValue::I32(_) => "i32",
            UniformValue::U32(_) => "u32",
            UniformValue::Vec2(_) => "vec2<f32>",
            UniformValue::Vec3(_) => "vec3<f32>",
        }
    }

    fn matches(&self, kind: UniformKind) -> bool {
        matches!(
            (self, kind),
            (UniformValue::F32(_), UniformKind::F32)
                | (UniformValue::I32(_), UniformKind::I32)
                | (UniformValue::U32(_), UniformKind::U32)
                | (UniformValue::Vec2(_), UniformKind::Vec2)
                | (UniformValue::Vec3(_), UniformKind::Vec3)
        )
    }

    fn write(&self, out: &mut [u8]) {
        match self {
            UniformValue::F32(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::I32(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::U32(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => out.copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec3(v) => out.copy_from_slice(bytemuck::cast_slice(v)),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    field: UniformField,
    offset: usize,
}

#[derive(Debug, Clone)]
pub struct UniformLayout {
    slots: Vec<Slot>,
    size: usize,
}

impl UniformLayout {
    pub fn new(fields: &[UniformField]) -> Self {
        let mut offset = 0usize;
        let mut max_align = 4usize;
        let mut slots = Vec::with_capacity(fields.len());
        for field in fields {
            let align = field.kind.align();
            max_align = max_align.max(align);
            offset = offset.next_multiple_of(align);
            slots.push(Slot {
                field: *field,
                offset,
            });
            offset += field.kind.size();
        }
        Self {
            slots,
            size: offset.next_multiple_of(max_align),
        }
    }

    /// Layout with offsets and struct size taken as given, e.g. from shader reflection.
    pub fn from_offsets(fields: Vec<(UniformField, usize)>, size: usize) -> Self {
        let slots = fields
            .into_iter()
            .map(|(field, offset)| Slot { field, offset })
            .collect();
        Self { slots, size }
    }

    pub fn fields(&self) -> impl Iterator<Item = &UniformField> + '_ {
        self.slots.iter().map(|slot| &slot.field)
    }

    /// Struct size as WGSL computes it.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Uniform buffer allocation size (never zero, multiple of 16).
    pub fn buffer_size(&self) -> u64 {
        self.size.max(16).next_multiple_of(16) as u64
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.slot(name).map(|slot| slot.offset)
    }

    pub fn kind_of(&self, name: &str) -> Option<UniformKind> {
        self.slot(name).map(|slot| slot.field.kind)
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.field.name == name)
    }
}

/// CPU staging copy of one pass's uniform buffer.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    program: String,
    layout: UniformLayout,
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(program: impl Into<String>, layout: UniformLayout) -> Self {
        let bytes = vec![0u8; layout.buffer_size() as usize];
        Self {
            program: program.into(),
            layout,
            bytes,
        }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformBindError> {
        let slot = self
            .layout
            .slot(name)
            .ok_or_else(|| UniformBindError::Missing {
                program: self.program.clone(),
                name: name.to_string(),
            })?;
        if !value.matches(slot.field.kind) {
            return Err(UniformBindError::TypeMismatch {
                program: self.program.clone(),
                name: name.to_string(),
                expected: slot.field.kind.wgsl_name(),
                got: value.kind_name(),
            });
        }
        let end = slot.offset + slot.field.kind.size();
        value.write(&mut self.bytes[slot.offset..end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIME: &[UniformField] = &[
        UniformField::new("clr_fg", UniformKind::Vec3),
        UniformField::new("movement_speed", UniformKind::F32),
        UniformField::new("rotation_speed", UniformKind::F32),
        UniformField::new("sensor_angle", UniformKind::F32),
        UniformField::new("sensor_distance", UniformKind::I32),
        UniformField::new("sensor_size", UniformKind::I32),
        UniformField::new("frame_time", UniformKind::F32),
        UniformField::new("time", UniformKind::F32),
    ];

    #[test]
    fn scalar_packs_into_vec3_tail() {
        let layout = UniformLayout::new(SLIME);
        assert_eq!(layout.offset_of("clr_fg"), Some(0));
        assert_eq!(layout.offset_of("movement_speed"), Some(12));
        assert_eq!(layout.offset_of("sensor_distance"), Some(24));
        assert_eq!(layout.offset_of("time"), Some(36));
        assert_eq!(layout.size(), 48);
    }

    #[test]
    fn vec3_after_scalar_is_realigned() {
        let layout = UniformLayout::new(&[
            UniformField::new("a", UniformKind::F32),
            UniformField::new("b", UniformKind::Vec3),
            UniformField::new("c", UniformKind::Vec2),
        ]);
        assert_eq!(layout.offset_of("b"), Some(16));
        assert_eq!(layout.offset_of("c"), Some(32));
        assert_eq!(layout.size(), 48);
    }

    #[test]
    fn scalar_only_struct_keeps_min_buffer() {
        let layout = UniformLayout::new(&[
            UniformField::new("diffusion_speed", UniformKind::F32),
            UniformField::new("evaporation_speed", UniformKind::F32),
            UniformField::new("frame_time", UniformKind::F32),
        ]);
        assert_eq!(layout.size(), 12);
        assert_eq!(layout.buffer_size(), 16);
    }

    #[test]
    fn set_writes_at_offset() {
        let mut block = UniformBlock::new("slime", UniformLayout::new(SLIME));
        block.set("clr_fg", UniformValue::Vec3([0.25, 0.5, 1.0])).unwrap();
        block.set("sensor_size", UniformValue::I32(-3)).unwrap();
        let floats: [f32; 3] = bytemuck::pod_read_unaligned(&block.bytes()[0..12]);
        assert_eq!(floats, [0.25, 0.5, 1.0]);
        let size: i32 = bytemuck::pod_read_unaligned(&block.bytes()[28..32]);
        assert_eq!(size, -3);
    }

    #[test]
    fn unknown_name_is_missing() {
        let mut block = UniformBlock::new("blur", UniformLayout::new(&SLIME[..1]));
        let err = block.set("time", UniformValue::F32(1.0)).unwrap_err();
        assert_eq!(
            err,
            UniformBindError::Missing {
                program: "blur".into(),
                name: "time".into()
            }
        );
    }

    #[test]
    fn wrong_kind_is_rejected_without_writing() {
        let mut block = UniformBlock::new("slime", UniformLayout::new(SLIME));
        let err = block.set("movement_speed", UniformValue::I32(4)).unwrap_err();
        assert!(matches!(err, UniformBindError::TypeMismatch { expected: "f32", .. }));
        assert!(block.bytes().iter().all(|b| *b == 0));
    }
}
