//! 根签名
//!
//! 根签名描述 shader 的绑定布局：每个根参数是根常量、根描述符
//! 或描述符表。创建时把 (寄存器种类, register, space) 到根参数
//! 下标的映射建好，录制时按名字绑定只需一次查表。

use std::collections::HashMap;

use crate::descriptors::GfxDescriptorHeapKind;
use crate::error::GfxError;

/// shader 寄存器的种类（b / t / u / s）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxRegisterKind {
    Cbv,
    Srv,
    Uav,
    Sampler,
}

impl GfxRegisterKind {
    /// 该寄存器的描述符位于哪种堆
    #[inline]
    pub fn heap_kind(self) -> GfxDescriptorHeapKind {
        match self {
            Self::Cbv | Self::Srv | Self::Uav => GfxDescriptorHeapKind::CbvSrvUav,
            Self::Sampler => GfxDescriptorHeapKind::Sampler,
        }
    }
}

/// 根参数的种类
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GfxRootParameterKind {
    /// 32-bit 根常量
    Constants { num_values: u32 },
    /// 根描述符（直接绑 GPU 地址）
    Cbv,
    Srv,
    Uav,
    /// 描述符表
    DescriptorTable { num_descriptors: u32 },
}

/// 单个根参数的声明
#[derive(Clone, Debug)]
pub struct GfxRootParameter {
    pub kind: GfxRootParameterKind,
    /// 该参数覆盖的寄存器；描述符表从 (kind, register, space) 起
    /// 连续占用 num_descriptors 个寄存器
    pub register_kind: GfxRegisterKind,
    pub register: u32,
    pub space: u32,
}

impl GfxRootParameter {
    pub fn constants(num_values: u32, register: u32, space: u32) -> Self {
        Self {
            kind: GfxRootParameterKind::Constants { num_values },
            register_kind: GfxRegisterKind::Cbv,
            register,
            space,
        }
    }

    pub fn cbv(register: u32, space: u32) -> Self {
        Self { kind: GfxRootParameterKind::Cbv, register_kind: GfxRegisterKind::Cbv, register, space }
    }

    pub fn srv(register: u32, space: u32) -> Self {
        Self { kind: GfxRootParameterKind::Srv, register_kind: GfxRegisterKind::Srv, register, space }
    }

    pub fn uav(register: u32, space: u32) -> Self {
        Self { kind: GfxRootParameterKind::Uav, register_kind: GfxRegisterKind::Uav, register, space }
    }

    pub fn descriptor_table(
        register_kind: GfxRegisterKind,
        num_descriptors: u32,
        register: u32,
        space: u32,
    ) -> Self {
        Self {
            kind: GfxRootParameterKind::DescriptorTable { num_descriptors },
            register_kind,
            register,
            space,
        }
    }
}

/// 按名字绑定时查表得到的位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxBindPoint {
    /// 根参数下标
    pub param: u32,
    /// 描述符表内的偏移；非表参数恒为 0
    pub offset: u32,
}

pub struct GfxRootSignature {
    name: String,
    parameters: Vec<GfxRootParameter>,
    /// (寄存器种类, register, space) -> 绑定位置
    register_map: HashMap<(GfxRegisterKind, u32, u32), GfxBindPoint>,
}

// new & init
impl GfxRootSignature {
    pub fn new(name: impl Into<String>, parameters: Vec<GfxRootParameter>) -> Result<Self, GfxError> {
        let name = name.into();
        let mut register_map = HashMap::new();
        for (index, parameter) in parameters.iter().enumerate() {
            let span = match parameter.kind {
                GfxRootParameterKind::DescriptorTable { num_descriptors } => num_descriptors,
                _ => 1,
            };
            for offset in 0..span {
                let key = (parameter.register_kind, parameter.register + offset, parameter.space);
                let bind = GfxBindPoint { param: index as u32, offset };
                if register_map.insert(key, bind).is_some() {
                    return Err(GfxError::DuplicateRegister {
                        root_signature: name,
                        kind: key.0,
                        register: key.1,
                        space: key.2,
                    });
                }
            }
        }
        Ok(Self { name, parameters, register_map })
    }
}

// getters
impl GfxRootSignature {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parameters(&self) -> &[GfxRootParameter] {
        &self.parameters
    }

    #[inline]
    pub fn parameter(&self, index: u32) -> Option<&GfxRootParameter> {
        self.parameters.get(index as usize)
    }
}

// 查询
impl GfxRootSignature {
    /// 找到 (kind, register, space) 对应的绑定位置
    pub fn find_bind_point(
        &self,
        kind: GfxRegisterKind,
        register: u32,
        space: u32,
    ) -> Result<GfxBindPoint, GfxError> {
        self.register_map.get(&(kind, register, space)).copied().ok_or_else(|| GfxError::UnknownRegister {
            root_signature: self.name.clone(),
            kind,
            register,
            space,
        })
    }

    /// 位图：第 i 位为 1 表示根参数 i 是 `heap_kind` 堆上的描述符表
    pub fn descriptor_table_bitmask(&self, heap_kind: GfxDescriptorHeapKind) -> u32 {
        let mut bitmask = 0u32;
        for (index, parameter) in self.parameters.iter().enumerate() {
            if matches!(parameter.kind, GfxRootParameterKind::DescriptorTable { .. })
                && parameter.register_kind.heap_kind() == heap_kind
            {
                bitmask |= 1 << index;
            }
        }
        bitmask
    }

    /// 根参数 i 的描述符表容量；非表参数为 0
    pub fn num_descriptors_in_table(&self, index: u32) -> u32 {
        match self.parameters.get(index as usize).map(|p| &p.kind) {
            Some(GfxRootParameterKind::DescriptorTable { num_descriptors }) => *num_descriptors,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_point_lookup() {
        let rs = GfxRootSignature::new(
            "test",
            vec![
                GfxRootParameter::constants(4, 0, 0),
                GfxRootParameter::descriptor_table(GfxRegisterKind::Srv, 3, 0, 0),
            ],
        )
        .unwrap();

        let bind = rs.find_bind_point(GfxRegisterKind::Srv, 2, 0).unwrap();
        assert_eq!(bind, GfxBindPoint { param: 1, offset: 2 });
        let bind = rs.find_bind_point(GfxRegisterKind::Cbv, 0, 0).unwrap();
        assert_eq!(bind, GfxBindPoint { param: 0, offset: 0 });
        assert!(rs.find_bind_point(GfxRegisterKind::Uav, 0, 0).is_err());
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let result = GfxRootSignature::new(
            "dup",
            vec![GfxRootParameter::srv(1, 0), GfxRootParameter::descriptor_table(GfxRegisterKind::Srv, 4, 0, 0)],
        );
        assert!(matches!(result, Err(GfxError::DuplicateRegister { register: 1, .. })));
    }

    #[test]
    fn test_table_bitmask_splits_by_heap_kind() {
        let rs = GfxRootSignature::new(
            "mask",
            vec![
                GfxRootParameter::descriptor_table(GfxRegisterKind::Srv, 2, 0, 0),
                GfxRootParameter::cbv(0, 0),
                GfxRootParameter::descriptor_table(GfxRegisterKind::Sampler, 1, 0, 0),
                GfxRootParameter::descriptor_table(GfxRegisterKind::Uav, 2, 0, 0),
            ],
        )
        .unwrap();
        assert_eq!(rs.descriptor_table_bitmask(GfxDescriptorHeapKind::CbvSrvUav), 0b1001);
        assert_eq!(rs.descriptor_table_bitmask(GfxDescriptorHeapKind::Sampler), 0b0100);
        assert_eq!(rs.num_descriptors_in_table(0), 2);
        assert_eq!(rs.num_descriptors_in_table(1), 0);
    }
}
