//! Device placement of quantized pages.
//!
//! Evaluated once per page build. The request context wins when it is on the
//! right kind of device, then the context the container was built with, and
//! finally a context synthesized from the request.

use crate::core::context::Context;

/// Which rule picked the build context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The caller's request context
    Requested,
    /// The context recorded at construction
    Construction,
    /// A context derived from the request on the other kind of device
    Synthesized,
}

/// Context to build an ellpack page with; ellpack pages live on CUDA devices.
///
/// When both contexts are CUDA devices the request context is used, even if
/// its ordinal differs from the construction device.
pub fn ellpack_context(ctx: &Context, fmat_ctx: &Context) -> (Context, Placement) {
    if ctx.is_cuda() {
        (ctx.clone(), Placement::Requested)
    } else if fmat_ctx.is_cuda() {
        (fmat_ctx.clone(), Placement::Construction)
    } else {
        log::warn!(
            "Ellpack page requested from {} on a matrix built on {}; \
             parameters changed during training, building on a synthesized CUDA context",
            ctx.device(),
            fmat_ctx.device()
        );
        (ctx.make_cuda(), Placement::Synthesized)
    }
}

/// Context to build a gradient index with; gradient indices live on the host.
pub fn ghist_context(ctx: &Context, fmat_ctx: &Context) -> (Context, Placement) {
    if !ctx.is_cuda() {
        (ctx.clone(), Placement::Requested)
    } else if !fmat_ctx.is_cuda() {
        (fmat_ctx.clone(), Placement::Construction)
    } else {
        log::warn!(
            "Gradient index requested from {} on a matrix built on {}; \
             parameters changed during training, building on the host",
            ctx.device(),
            fmat_ctx.device()
        );
        (ctx.make_cpu(), Placement::Synthesized)
    }
}
