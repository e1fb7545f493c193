//! 物理设备选择

/// 物理 GPU 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

/// 从候选设备中选出渲染使用的 GPU
///
/// 优先选择独立显卡；没有独立显卡时退回集成显卡；两者都没有时返回 `None`。
/// 同类型的多个设备中取第一个。虚拟显卡、CPU 实现等不会被选中。
pub fn select_gpu<T, I>(candidates: I) -> Option<T>
where
    I: IntoIterator<Item = (T, GpuType)>,
{
    let mut integrated = None;

    for (candidate, gpu_type) in candidates {
        match gpu_type {
            GpuType::Discrete => return Some(candidate),
            GpuType::Integrated if integrated.is_none() => integrated = Some(candidate),
            _ => {}
        }
    }

    integrated
}
