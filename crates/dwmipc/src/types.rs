//! Data records exchanged with dwm
//!
//! These mirror the JSON objects dwm produces for `GET_*` replies and for
//! event payloads. Field names follow the wire names so the serde derives
//! need no renaming.

use serde::{Deserialize, Serialize};

/// X11 window identifier (XID)
pub type WindowId = u64;

/// A rectangle in screen coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A width/height pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Per-tag state bitmasks, one bit per tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagState {
    /// Tags currently in view
    pub selected: u32,
    /// Tags holding at least one client
    pub occupied: u32,
    /// Tags holding an urgent client
    pub urgent: u32,
}

/// A tag as defined in dwm's config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub bit_mask: u32,
    pub name: String,
}

/// A layout as defined in dwm's config
///
/// `symbol` is the defining symbol of the layout. The symbol reported by a
/// [`Monitor`] or a [`LayoutChangeEvent`] may be a variation of it (monocle
/// shows the client count, for instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub symbol: String,
    /// Address of the layout in dwm's memory, accepted by `setlayoutsafe`
    pub address: u64,
}

/// A current/previous pair, used throughout dwm's replies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<T> {
    pub current: T,
    pub old: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorClients {
    /// The focused client on this monitor, if any
    pub selected: Option<WindowId>,
    /// Clients in focus stack order
    pub stack: Vec<WindowId>,
    /// All clients in tiling order
    pub all: Vec<WindowId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorLayout {
    pub symbol: Change<String>,
    pub address: Change<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub y: i32,
    pub is_shown: bool,
    pub is_top: bool,
    pub window_id: WindowId,
}

/// A monitor as reported by `GET_MONITORS`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    /// Fraction of the screen given to the master area
    pub master_factor: f32,
    pub num_master: i32,
    /// Index of the monitor according to dwm
    pub num: u32,
    pub is_selected: bool,
    pub monitor_geometry: Geometry,
    /// Usable area excluding the bar
    pub window_geometry: Geometry,
    pub tagset: Change<u32>,
    pub tag_state: TagState,
    pub clients: MonitorClients,
    pub layout: MonitorLayout,
    pub bar: Bar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub min: f32,
    pub max: f32,
}

/// ICCCM size hints supplied by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeHints {
    pub base: Size,
    pub step: Size,
    pub max: Size,
    pub min: Size,
    pub aspect_ratio: AspectRatio,
}

/// Client state flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Floating state saved while the client is fullscreen
    pub old_state: bool,
    pub is_fixed: bool,
    pub is_floating: bool,
    pub is_fullscreen: bool,
    pub is_urgent: bool,
    /// The client handles its own input focus
    pub never_focus: bool,
}

/// A managed window as reported by `GET_DWM_CLIENT`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    /// Bitmask of the tags this client is on
    pub tags: u32,
    pub window_id: WindowId,
    pub monitor_number: u32,
    pub geometry: Change<Geometry>,
    pub size_hints: SizeHints,
    pub border_width: Change<i32>,
    pub states: ClientState,
}

/// Payload of `tag_change_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagChangeEvent {
    pub monitor_number: u32,
    pub old_state: TagState,
    pub new_state: TagState,
}

/// Payload of `client_focus_change_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFocusChangeEvent {
    pub monitor_number: u32,
    /// Previously focused client, `None` when nothing was focused
    pub old_win_id: Option<WindowId>,
    pub new_win_id: Option<WindowId>,
}

/// Payload of `layout_change_event`
///
/// The symbol can change without the layout changing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutChangeEvent {
    pub monitor_number: u32,
    pub old_symbol: String,
    pub old_address: u64,
    pub new_symbol: String,
    pub new_address: u64,
}

/// Payload of `monitor_focus_change_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorFocusChangeEvent {
    pub old_monitor_number: u32,
    pub new_monitor_number: u32,
}

/// Payload of `focused_title_change_event`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedTitleChangeEvent {
    pub monitor_number: u32,
    pub client_window_id: Option<WindowId>,
    pub old_name: String,
    pub new_name: String,
}

/// Payload of `focused_state_change_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedStateChangeEvent {
    pub monitor_number: u32,
    pub client_window_id: Option<WindowId>,
    pub old_state: ClientState,
    pub new_state: ClientState,
}
