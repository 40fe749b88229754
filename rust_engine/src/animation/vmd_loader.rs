//! VMD 文件加载器
//!
//! 解析 VMD 动画文件并转换为 Motion 数据。
//! 文件头 50 字节（30 字节签名 + 20 字节模型名），之后是骨骼关键帧表；
//! 骨骼表之后的 Morph、相机、光照、阴影和 IK 开关段是可选的，只保留 IK 开关。

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Quat, Vec3};

use crate::{MmdError, Result};

use super::keyframe::{BoneKeyframe, IkKeyframe};
use super::motion::Motion;
use super::BezierCurve;

/// VMD 文件头
const VMD_HEADER_V1: &[u8] = b"Vocaloid Motion Data file";
const VMD_HEADER_V2: &[u8] = b"Vocaloid Motion Data 0002";

const SIGNATURE_SIZE: usize = 30;
const MODEL_NAME_SIZE: usize = 20;
const BONE_NAME_SIZE: usize = 15;
const IK_NAME_SIZE: usize = 20;

/// 各可选段的单条记录大小
const MORPH_RECORD_SIZE: u64 = 23;
const CAMERA_RECORD_SIZE: u64 = 61;
const LIGHT_RECORD_SIZE: u64 = 28;
const SELF_SHADOW_RECORD_SIZE: u64 = 9;

/// VMD 文件数据
#[derive(Debug, Clone)]
pub struct VmdFile {
    /// 模型名称
    pub model_name: String,
    /// Motion 数据
    pub motion: Motion,
}

impl VmdFile {
    /// 从文件路径加载 VMD
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let vmd = Self::load_from_reader(&mut reader)?;

        log::info!(
            "Loaded VMD {:?}: model '{}', {} bone tracks, {} frames",
            path.as_ref(),
            vmd.model_name,
            vmd.motion.bone_track_names().count(),
            vmd.motion.max_frame()
        );
        Ok(vmd)
    }

    /// 从字节切片加载 VMD
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = io::Cursor::new(bytes);
        Self::load_from_reader(&mut reader)
    }

    /// 从 Reader 加载 VMD
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        // 读取头部
        let mut signature = [0u8; SIGNATURE_SIZE];
        reader
            .read_exact(&mut signature)
            .map_err(|e| MmdError::VmdParse(format!("Failed to read header: {}", e)))?;

        // 签名不对也继续按 VMD 布局读取
        let prefix = &signature[..VMD_HEADER_V2.len()];
        if prefix != VMD_HEADER_V1 && prefix != VMD_HEADER_V2 {
            log::warn!("Unexpected VMD signature, reading as VMD anyway");
        }

        // 读取模型名称 (20 字节)
        let mut model_name_bytes = [0u8; MODEL_NAME_SIZE];
        reader
            .read_exact(&mut model_name_bytes)
            .map_err(|e| MmdError::VmdParse(format!("Failed to read model name: {}", e)))?;
        let model_name = decode_shift_jis(&model_name_bytes);

        // 读取骨骼关键帧
        let bone_keyframe_count = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| MmdError::VmdParse(format!("Failed to read bone keyframe count: {}", e)))?;

        let mut records = Vec::new();
        for _ in 0..bone_keyframe_count {
            records.push(read_bone_keyframe(reader)?);
        }

        let mut motion = Motion::build(records);

        // 较老的 VMD 文件没有后续段，读不完整不算错误
        if let Err(e) = read_tail_sections(reader, &mut motion) {
            log::debug!("VMD optional sections stopped early: {}", e);
        }

        Ok(Self { model_name, motion })
    }

    /// 获取最大帧数
    pub fn max_frame(&self) -> u32 {
        self.motion.max_frame()
    }

    pub fn into_motion(self) -> Motion {
        self.motion
    }
}

/// 读取骨骼关键帧（111 字节）
fn read_bone_keyframe<R: Read>(reader: &mut R) -> Result<(String, BoneKeyframe)> {
    // 骨骼名称 (15 字节)
    let mut name_bytes = [0u8; BONE_NAME_SIZE];
    reader
        .read_exact(&mut name_bytes)
        .map_err(|e| MmdError::VmdParse(format!("Failed to read bone name: {}", e)))?;
    let name = decode_shift_jis(&name_bytes);

    // 帧索引
    let frame_index = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MmdError::VmdParse(format!("Failed to read frame index: {}", e)))?;

    // 平移 (x, y, z)
    let mut translation = [0f32; 3];
    reader
        .read_f32_into::<LittleEndian>(&mut translation)
        .map_err(|e| MmdError::VmdParse(format!("Failed to read translation: {}", e)))?;

    // 旋转 (四元数 x, y, z, w)
    let mut rotation = [0f32; 4];
    reader
        .read_f32_into::<LittleEndian>(&mut rotation)
        .map_err(|e| MmdError::VmdParse(format!("Failed to read rotation: {}", e)))?;

    // 插值参数 (64 字节)
    let mut interpolation = [0u8; 64];
    reader
        .read_exact(&mut interpolation)
        .map_err(|e| MmdError::VmdParse(format!("Failed to read interpolation: {}", e)))?;

    // 每行格式：X_x1, Y_x1, Z_x1, R_x1, X_y1, ...，只取旋转列
    let curve = BezierCurve::from_vmd_data(&[
        interpolation[3],
        interpolation[7],
        interpolation[11],
        interpolation[15],
    ]);

    let orientation = Quat::from_array(rotation);
    // 全零四元数按单位旋转处理
    let orientation = if orientation.length_squared() > 0.0 {
        orientation.normalize()
    } else {
        Quat::IDENTITY
    };

    let keyframe = BoneKeyframe {
        frame_index,
        translation: Vec3::from_array(translation),
        orientation,
        interpolation: curve,
    };

    Ok((name, keyframe))
}

/// 按顺序读取可选段：Morph、相机、光照、阴影（跳过），IK 开关（保留）
fn read_tail_sections<R: Read>(reader: &mut R, motion: &mut Motion) -> Result<()> {
    for (section, record_size) in [
        ("morph", MORPH_RECORD_SIZE),
        ("camera", CAMERA_RECORD_SIZE),
        ("light", LIGHT_RECORD_SIZE),
        ("self shadow", SELF_SHADOW_RECORD_SIZE),
    ] {
        let count = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| MmdError::VmdParse(format!("Failed to read {} count: {}", section, e)))?;
        skip_records(reader, count, record_size, section)?;
    }

    let ik_frame_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MmdError::VmdParse(format!("Failed to read IK frame count: {}", e)))?;

    for _ in 0..ik_frame_count {
        for (name, keyframe) in read_ik_keyframe(reader)? {
            motion.insert_ik_keyframe(&name, keyframe);
        }
    }

    Ok(())
}

fn skip_records<R: Read>(
    reader: &mut R,
    count: u32,
    record_size: u64,
    section: &str,
) -> Result<()> {
    let expected = count as u64 * record_size;
    let skipped = io::copy(&mut reader.by_ref().take(expected), &mut io::sink())?;
    if skipped != expected {
        return Err(MmdError::VmdParse(format!(
            "Truncated {} section: {} of {} bytes",
            section, skipped, expected
        )));
    }
    Ok(())
}

/// 读取 IK 开关帧
/// 每帧包含帧索引、显示标志和多个 IK 开关
fn read_ik_keyframe<R: Read>(reader: &mut R) -> Result<Vec<(String, IkKeyframe)>> {
    // 帧索引
    let frame_index = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MmdError::VmdParse(format!("Failed to read IK frame index: {}", e)))?;

    // 显示标志 (1 字节)
    let _show = reader
        .read_u8()
        .map_err(|e| MmdError::VmdParse(format!("Failed to read IK show flag: {}", e)))?;

    // IK 信息数量
    let ik_info_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MmdError::VmdParse(format!("Failed to read IK info count: {}", e)))?;

    let mut keyframes = Vec::new();
    for _ in 0..ik_info_count {
        // IK 名称 (20 字节)
        let mut name_bytes = [0u8; IK_NAME_SIZE];
        reader
            .read_exact(&mut name_bytes)
            .map_err(|e| MmdError::VmdParse(format!("Failed to read IK name: {}", e)))?;
        let ik_name = decode_shift_jis(&name_bytes);

        // 启用标志 (1 字节)
        let enabled = reader
            .read_u8()
            .map_err(|e| MmdError::VmdParse(format!("Failed to read IK enable flag: {}", e)))?
            != 0;

        keyframes.push((ik_name, IkKeyframe::new(frame_index, enabled)));
    }

    Ok(keyframes)
}

/// 解码 Shift-JIS 固定长度字符串（截断到第一个 NUL）
pub(crate) fn decode_shift_jis(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let (decoded, _, _) = encoding_rs::SHIFT_JIS.decode(&bytes[..end]);
    decoded.into_owned()
}

/// 测试用的 VMD 字节构造
#[cfg(test)]
pub(crate) mod test_data {
    use byteorder::{LittleEndian, WriteBytesExt};

    pub fn encode_name(name: &str, size: usize) -> Vec<u8> {
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(name);
        let mut bytes = encoded.into_owned();
        bytes.resize(size, 0);
        bytes
    }

    /// 骨骼关键帧：(名称, 帧号, 平移, 旋转 xyzw, 旋转曲线 [x1, y1, x2, y2])
    pub type BoneEntry<'a> = (&'a str, u32, [f32; 3], [f32; 4], [u8; 4]);

    pub fn header(model_name: &str) -> Vec<u8> {
        let mut bytes = encode_name("Vocaloid Motion Data 0002", 30);
        bytes.extend(encode_name(model_name, 20));
        bytes
    }

    pub fn bone_section(entries: &[BoneEntry]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(entries.len() as u32).unwrap();
        for (name, frame, translation, rotation, curve) in entries {
            bytes.extend(encode_name(name, 15));
            bytes.write_u32::<LittleEndian>(*frame).unwrap();
            for v in translation.iter().chain(rotation.iter()) {
                bytes.write_f32::<LittleEndian>(*v).unwrap();
            }
            let mut interpolation = [0u8; 64];
            interpolation[3] = curve[0];
            interpolation[7] = curve[1];
            interpolation[11] = curve[2];
            interpolation[15] = curve[3];
            bytes.extend_from_slice(&interpolation);
        }
        bytes
    }

    /// 空的 Morph/相机/光照/阴影段，加上 IK 开关帧：(帧号, [(名称, 启用)])
    pub fn tail_sections(ik_frames: &[(u32, Vec<(&str, bool)>)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.write_u32::<LittleEndian>(0).unwrap();
        }
        bytes.write_u32::<LittleEndian>(ik_frames.len() as u32).unwrap();
        for (frame, switches) in ik_frames {
            bytes.write_u32::<LittleEndian>(*frame).unwrap();
            bytes.write_u8(1).unwrap();
            bytes.write_u32::<LittleEndian>(switches.len() as u32).unwrap();
            for (name, enabled) in switches {
                bytes.extend(encode_name(name, 20));
                bytes.write_u8(*enabled as u8).unwrap();
            }
        }
        bytes
    }
}
