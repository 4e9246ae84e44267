pub mod push_channel;
pub mod render_surface;
pub mod surface_adapter;

pub use push_channel::{ChannelEvent, PushConnector, PushSession, SessionFeed, WebSocketConnector};
pub use render_surface::{
    DrawContext, DrawOp, HeadlessSurface, RecordingContext, RenderSurface, SurfaceHandle,
    TileLayerSpec,
};
pub use surface_adapter::SurfaceAdapter;
