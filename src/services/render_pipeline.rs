//! 非破坏性视觉滤镜 - 业务能力层
//!
//! 每次绘制一个图层时计算滤镜链，并严格限定在这一次绘制内：
//! 绘制前 `save` + 设置滤镜，绘制后 `restore`，不会影响其他图层或底图。

use std::fmt;

use crate::infrastructure::DrawContext;
use crate::models::{FilterValues, RenderLayer};

/// 单个滤镜操作
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    Brightness(f64),
    Contrast(f64),
    Saturate(f64),
    /// 角度
    HueRotate(f64),
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Brightness(v) => write!(f, "brightness({})", v),
            FilterOp::Contrast(v) => write!(f, "contrast({})", v),
            FilterOp::Saturate(v) => write!(f, "saturate({})", v),
            FilterOp::HueRotate(deg) => write!(f, "hue-rotate({}deg)", deg),
        }
    }
}

/// 亮度与曝光先相加，再转为一个亮度倍数
pub fn brightness_multiplier(values: &FilterValues) -> f64 {
    1.0 + (values.brightness + values.exposure) / 100.0
}

/// 透明度 0..=100 线性映射为图层不透明度
pub fn layer_opacity(values: &FilterValues) -> f64 {
    values.transparency.clamp(0.0, 100.0) / 100.0
}

/// 有序滤镜链：brightness → contrast → saturate → hue-rotate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    ops: Vec<FilterOp>,
}

impl FilterChain {
    /// 由调整参数组合滤镜链，中性值不产生操作
    pub fn compose(values: &FilterValues) -> Self {
        let mut ops = Vec::with_capacity(4);

        let brightness = brightness_multiplier(values);
        if brightness != 1.0 {
            ops.push(FilterOp::Brightness(brightness));
        }
        if values.contrast != 0.0 {
            ops.push(FilterOp::Contrast(1.0 + values.contrast / 100.0));
        }
        if values.saturation != 0.0 {
            ops.push(FilterOp::Saturate(1.0 + values.saturation / 100.0));
        }
        if values.hue != 0.0 {
            ops.push(FilterOp::HueRotate(values.hue));
        }

        Self { ops }
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// 画布滤镜字符串，空链为 `none`
    pub fn to_filter_string(&self) -> String {
        if self.ops.is_empty() {
            return "none".to_string();
        }
        self.ops
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 一次绘制内的滤镜作用域，drop 时恢复画布状态
pub struct FilterScope<'a, C: DrawContext> {
    ctx: &'a mut C,
}

impl<'a, C: DrawContext> FilterScope<'a, C> {
    pub fn acquire(ctx: &'a mut C, chain: &FilterChain) -> Self {
        ctx.save();
        ctx.set_filter(&chain.to_filter_string());
        Self { ctx }
    }

    pub fn context(&mut self) -> &mut C {
        self.ctx
    }
}

impl<C: DrawContext> Drop for FilterScope<'_, C> {
    fn drop(&mut self) {
        self.ctx.restore();
    }
}

/// 绘制单个图层；不可见的图层不绘制，返回 false
pub fn draw_layer<C, F>(ctx: &mut C, layer: &RenderLayer, draw: F) -> bool
where
    C: DrawContext,
    F: FnOnce(&mut C),
{
    if !layer.visible {
        return false;
    }
    let chain = FilterChain::compose(&layer.filter_values);
    let mut scope = FilterScope::acquire(ctx, &chain);
    draw(scope.context());
    true
}

/// 按顺序绘制一帧，返回实际绘制的图层数
pub fn draw_frame<C, F>(ctx: &mut C, layers: &[RenderLayer], mut draw: F) -> usize
where
    C: DrawContext,
    F: FnMut(&mut C, &RenderLayer),
{
    layers
        .iter()
        .filter(|layer| draw_layer(ctx, layer, |c| draw(c, layer)))
        .count()
}
