//! PMD 模型加载器
//!
//! 只读取骨骼系统需要的部分：文件头、骨骼表和 IK 表。
//! 顶点、索引和材质记录按固定大小跳过。

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;

use crate::animation::decode_shift_jis;
use crate::skeleton::{BoneRecord, IkDescriptor};
use crate::{MmdError, Result};

const PMD_SIGNATURE: &[u8; 3] = b"Pmd";
const MODEL_NAME_SIZE: usize = 20;
const COMMENT_SIZE: usize = 256;
const BONE_NAME_SIZE: usize = 20;

const VERTEX_RECORD_SIZE: u64 = 38;
const INDEX_RECORD_SIZE: u64 = 2;
const MATERIAL_RECORD_SIZE: u64 = 70;

/// PMD 文件中骨骼系统用到的数据
#[derive(Debug, Clone)]
pub struct PmdFile {
    pub version: f32,
    pub name: String,
    pub comment: String,
    pub vertex_count: u32,
    pub index_count: u32,
    pub material_count: u32,
    pub bones: Vec<BoneRecord>,
    pub iks: Vec<IkDescriptor>,
}

impl PmdFile {
    /// 从文件路径加载 PMD
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let pmd = Self::load_from_reader(&mut reader)?;

        log::info!(
            "Loaded PMD {:?}: '{}', {} bones, {} IK chains",
            path.as_ref(),
            pmd.name,
            pmd.bones.len(),
            pmd.iks.len()
        );
        Ok(pmd)
    }

    /// 从字节切片加载 PMD
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = io::Cursor::new(bytes);
        Self::load_from_reader(&mut reader)
    }

    /// 从 Reader 加载 PMD
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        // 读取头部
        let mut signature = [0u8; 3];
        reader
            .read_exact(&mut signature)
            .map_err(|e| MmdError::PmdParse(format!("Failed to read signature: {}", e)))?;
        if &signature != PMD_SIGNATURE {
            return Err(MmdError::PmdParse("Invalid PMD signature".to_string()));
        }

        let version = reader
            .read_f32::<LittleEndian>()
            .map_err(|e| MmdError::PmdParse(format!("Failed to read version: {}", e)))?;
        let name = read_fixed_string(reader, MODEL_NAME_SIZE, "model name")?;
        let comment = read_fixed_string(reader, COMMENT_SIZE, "comment")?;

        // 顶点、索引、材质只跳过
        let vertex_count = read_count_u32(reader, "vertex")?;
        skip_records(reader, vertex_count as u64, VERTEX_RECORD_SIZE, "vertex")?;
        let index_count = read_count_u32(reader, "index")?;
        skip_records(reader, index_count as u64, INDEX_RECORD_SIZE, "index")?;
        let material_count = read_count_u32(reader, "material")?;
        skip_records(reader, material_count as u64, MATERIAL_RECORD_SIZE, "material")?;

        let bones = read_bone_table(reader)?;
        let iks = read_ik_table(reader)?;

        log::debug!(
            "PMD '{}' v{}: {} vertices, {} indices, {} materials skipped",
            name,
            version,
            vertex_count,
            index_count,
            material_count
        );

        Ok(Self {
            version,
            name,
            comment,
            vertex_count,
            index_count,
            material_count,
            bones,
            iks,
        })
    }
}

/// 读取骨骼表：`u16` 数量 + 每条 39 字节
pub fn read_bone_table<R: Read>(reader: &mut R) -> Result<Vec<BoneRecord>> {
    let bone_count = reader
        .read_u16::<LittleEndian>()
        .map_err(|e| MmdError::PmdParse(format!("Failed to read bone count: {}", e)))?;

    let mut bones = Vec::with_capacity(bone_count as usize);
    for i in 0..bone_count {
        let name = read_fixed_string(reader, BONE_NAME_SIZE, "bone name")?;
        let parent_index = read_u16_field(reader, "bone parent")?;
        let tail_index = read_u16_field(reader, "bone tail")?;
        let kind = reader
            .read_u8()
            .map_err(|e| MmdError::PmdParse(format!("Failed to read bone {} type: {}", i, e)))?;
        let ik_bone_index = read_u16_field(reader, "bone IK parent")?;

        let mut position = [0f32; 3];
        reader
            .read_f32_into::<LittleEndian>(&mut position)
            .map_err(|e| MmdError::PmdParse(format!("Failed to read bone {} position: {}", i, e)))?;

        bones.push(BoneRecord {
            name,
            parent_index,
            tail_index,
            kind,
            ik_bone_index,
            position: Vec3::from_array(position),
        });
    }

    Ok(bones)
}

/// 读取 IK 表：`u16` 数量，每条为 IK 骨骼、末端骨骼、链长、迭代次数、角度限制和链节点
pub fn read_ik_table<R: Read>(reader: &mut R) -> Result<Vec<IkDescriptor>> {
    let ik_count = reader
        .read_u16::<LittleEndian>()
        .map_err(|e| MmdError::PmdParse(format!("Failed to read IK count: {}", e)))?;

    let mut iks = Vec::with_capacity(ik_count as usize);
    for _ in 0..ik_count {
        let target = read_u16_field(reader, "IK bone")?;
        let effector = read_u16_field(reader, "IK effector")?;
        let chain_length = reader
            .read_u8()
            .map_err(|e| MmdError::PmdParse(format!("Failed to read IK chain length: {}", e)))?;
        let iterations = read_u16_field(reader, "IK iterations")?;
        let angle_limit = reader
            .read_f32::<LittleEndian>()
            .map_err(|e| MmdError::PmdParse(format!("Failed to read IK angle limit: {}", e)))?;

        let mut chain = vec![0u16; chain_length as usize];
        reader
            .read_u16_into::<LittleEndian>(&mut chain)
            .map_err(|e| MmdError::PmdParse(format!("Failed to read IK chain: {}", e)))?;

        iks.push(IkDescriptor {
            target: target as usize,
            effector: effector as usize,
            iterations,
            angle_limit,
            chain: chain.into_iter().map(usize::from).collect(),
        });
    }

    Ok(iks)
}

fn read_fixed_string<R: Read>(reader: &mut R, size: usize, field: &str) -> Result<String> {
    let mut bytes = vec![0u8; size];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| MmdError::PmdParse(format!("Failed to read {}: {}", field, e)))?;
    Ok(decode_shift_jis(&bytes))
}

fn read_u16_field<R: Read>(reader: &mut R, field: &str) -> Result<u16> {
    reader
        .read_u16::<LittleEndian>()
        .map_err(|e| MmdError::PmdParse(format!("Failed to read {}: {}", field, e)))
}

fn read_count_u32<R: Read>(reader: &mut R, section: &str) -> Result<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MmdError::PmdParse(format!("Failed to read {} count: {}", section, e)))
}

fn skip_records<R: Read>(
    reader: &mut R,
    count: u64,
    record_size: u64,
    section: &str,
) -> Result<()> {
    let expected = count * record_size;
    let skipped = io::copy(&mut reader.by_ref().take(expected), &mut io::sink())?;
    if skipped != expected {
        return Err(MmdError::PmdParse(format!(
            "Truncated {} section: {} of {} bytes",
            section, skipped, expected
        )));
    }
    Ok(())
}

/// 测试用的 PMD 字节构造
#[cfg(test)]
pub(crate) mod test_data {
    use byteorder::{LittleEndian, WriteBytesExt};

    use crate::animation::vmd_test_data::encode_name;

    /// 骨骼：(名称, 父索引, 类型, 位置)
    pub type BoneEntry<'a> = (&'a str, u16, u8, [f32; 3]);
    /// IK：(IK 骨骼, 末端, 迭代次数, 角度限制, 链)
    pub type IkEntry = (u16, u16, u16, f32, Vec<u16>);

    pub fn pmd_bytes(name: &str, bones: &[BoneEntry], iks: &[IkEntry]) -> Vec<u8> {
        let mut bytes = b"Pmd".to_vec();
        bytes.write_f32::<LittleEndian>(1.0).unwrap();
        bytes.extend(encode_name(name, 20));
        bytes.extend(encode_name("comment", 256));

        // 一个顶点、三个索引、一个材质，内容无关
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.extend_from_slice(&[0u8; 38]);
        bytes.write_u32::<LittleEndian>(3).unwrap();
        bytes.extend_from_slice(&[0u8; 6]);
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.extend_from_slice(&[0u8; 70]);

        bytes.write_u16::<LittleEndian>(bones.len() as u16).unwrap();
        for (name, parent, kind, position) in bones {
            bytes.extend(encode_name(name, 20));
            bytes.write_u16::<LittleEndian>(*parent).unwrap();
            bytes.write_u16::<LittleEndian>(0).unwrap();
            bytes.write_u8(*kind).unwrap();
            bytes.write_u16::<LittleEndian>(0).unwrap();
            for v in position {
                bytes.write_f32::<LittleEndian>(*v).unwrap();
            }
        }

        bytes.write_u16::<LittleEndian>(iks.len() as u16).unwrap();
        for (target, effector, iterations, limit, chain) in iks {
            bytes.write_u16::<LittleEndian>(*target).unwrap();
            bytes.write_u16::<LittleEndian>(*effector).unwrap();
            bytes.write_u8(chain.len() as u8).unwrap();
            bytes.write_u16::<LittleEndian>(*iterations).unwrap();
            bytes.write_f32::<LittleEndian>(*limit).unwrap();
            for link in chain {
                bytes.write_u16::<LittleEndian>(*link).unwrap();
            }
        }

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::test_data::*;
    use super::*;
    use crate::skeleton::BoneKind;

    fn leg_bytes() -> Vec<u8> {
        pmd_bytes(
            "テスト",
            &[
                ("センター", 0xFFFF, 1, [0.0, 0.0, 0.0]),
                ("左足", 0, 0, [0.0, 2.0, 0.0]),
                ("左ひざ", 1, 4, [0.0, 1.0, 0.0]),
                ("左足首", 2, 6, [0.0, 0.0, 0.0]),
                ("左足ＩＫ", 0, 2, [0.0, 0.0, 0.0]),
            ],
            &[(4, 3, 40, 0.5, vec![2, 1])],
        )
    }

    #[test]
    fn test_load_bones_and_iks() {
        let pmd = PmdFile::load_from_bytes(&leg_bytes()).unwrap();
        assert_eq!(pmd.name, "テスト");
        assert_eq!(pmd.version, 1.0);
        assert_eq!(pmd.vertex_count, 1);
        assert_eq!(pmd.index_count, 3);
        assert_eq!(pmd.bones.len(), 5);

        let knee = &pmd.bones[2];
        assert_eq!(knee.name, "左ひざ");
        assert_eq!(knee.parent_index, 1);
        assert_eq!(BoneKind::from(knee.kind), BoneKind::IkLink);
        assert_eq!(knee.position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(pmd.bones[0].parent_index, 0xFFFF);

        assert_eq!(
            pmd.iks,
            vec![IkDescriptor {
                target: 4,
                effector: 3,
                iterations: 40,
                angle_limit: 0.5,
                chain: vec![2, 1],
            }]
        );
    }

    #[test]
    fn test_invalid_signature() {
        let mut bytes = leg_bytes();
        bytes[0] = b'X';
        assert!(matches!(PmdFile::load_from_bytes(&bytes), Err(MmdError::PmdParse(_))));
    }

    #[test]
    fn test_truncated_bone_table() {
        let bytes = leg_bytes();
        // 截断在 IK 表之前的骨骼表中间
        let truncated = &bytes[..bytes.len() - 30];
        let result = PmdFile::load_from_bytes(truncated);
        assert!(matches!(result, Err(MmdError::PmdParse(msg)) if msg.contains("bone")));
    }

    #[test]
    fn test_truncated_vertex_section() {
        let bytes = leg_bytes();
        let result = PmdFile::load_from_bytes(&bytes[..300]);
        assert!(matches!(result, Err(MmdError::PmdParse(msg)) if msg.contains("vertex")));
    }

    #[test]
    fn test_read_tables_directly() {
        let mut table = Vec::new();
        table.extend_from_slice(&0u16.to_le_bytes());
        table.extend_from_slice(&1u16.to_le_bytes());
        // IK 链长为 0
        table.extend_from_slice(&[7, 0, 8, 0, 0, 1, 0]);
        table.extend_from_slice(&1.0f32.to_le_bytes());

        let mut reader = io::Cursor::new(table);
        assert!(read_bone_table(&mut reader).unwrap().is_empty());
        let iks = read_ik_table(&mut reader).unwrap();
        assert_eq!(iks[0].target, 7);
        assert_eq!(iks[0].effector, 8);
        assert_eq!(iks[0].iterations, 1);
        assert!(iks[0].chain.is_empty());
    }
}
