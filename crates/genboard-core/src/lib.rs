//! Genboard Core Library
//!
//! Scene graph, viewport, history, persistence, and real-time
//! collaboration for the Genboard canvas.

pub mod collab;
pub mod interact;
pub mod lineage;
pub mod object;
pub mod project;
pub mod storage;
pub mod store;
pub mod sync;
pub mod viewport;

pub use collab::{CollabSession, SharedDoc};
pub use interact::{ActionOutcome, ContextAction, DragSession, TransformHandles};
pub use object::{CanvasObject, MIN_OBJECT_SIZE, ObjectId, ObjectKind, ObjectMeta, ObjectPatch, ShapeType};
pub use project::{Project, Workspace, WorkspaceRecord};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use store::{MAX_HISTORY, ObjectStore};
pub use sync::{AwarenessState, ConnectionState, CursorPosition, NativeWebSocket, SyncEvent};
pub use viewport::{MAX_ZOOM, MIN_ZOOM, Viewport};
