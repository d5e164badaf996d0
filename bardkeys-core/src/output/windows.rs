//! Win32 sink: posts keyboard messages straight to the game window's queue,
//! so keys land in the game even if another window grabs focus mid-phrase.

use std::ffi::c_void;

use bardkeys_types::VirtualKey;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, SetActiveWindow, MAPVK_VK_TO_VSC,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    FindWindowW, PostMessageW, SetForegroundWindow, WM_CHAR, WM_KEYDOWN, WM_KEYUP,
};

use super::sink::{KeySink, WindowHandle};

/// Repeat count 1.
const LPARAM_DOWN: u32 = 0x0000_0001;
/// Repeat count 1, previous state down, transition up.
const LPARAM_UP: u32 = 0xC000_0001;

pub struct WindowsSink {
    /// NUL-terminated UTF-16 titles, tried in order.
    titles: Vec<Vec<u16>>,
}

impl WindowsSink {
    pub fn new(titles: &[String]) -> Self {
        let titles = titles
            .iter()
            .map(|t| t.encode_utf16().chain(std::iter::once(0)).collect())
            .collect();
        Self { titles }
    }

    fn hwnd(target: WindowHandle) -> *mut c_void {
        target as *mut c_void
    }
}

impl KeySink for WindowsSink {
    fn find_target(&mut self) -> Option<WindowHandle> {
        self.titles.iter().find_map(|title| {
            // SAFETY: `title` is a NUL-terminated UTF-16 buffer that outlives the call.
            let hwnd = unsafe { FindWindowW(std::ptr::null(), title.as_ptr()) };
            (!hwnd.is_null()).then_some(hwnd as WindowHandle)
        })
    }

    fn focus(&mut self, target: WindowHandle) -> bool {
        let hwnd = Self::hwnd(target);
        // SAFETY: plain Win32 calls on a handle obtained from FindWindowW. A stale
        // handle makes them fail, it cannot cause undefined behaviour.
        unsafe {
            let fg = SetForegroundWindow(hwnd) != 0;
            SetActiveWindow(hwnd);
            fg
        }
    }

    fn key_event(&mut self, target: WindowHandle, key: VirtualKey, down: bool) -> bool {
        let hwnd = Self::hwnd(target);
        let vk = key.get() as u32;
        // SAFETY: see `focus`.
        unsafe {
            let scan = MapVirtualKeyW(vk, MAPVK_VK_TO_VSC);
            let bits = (scan << 16) | if down { LPARAM_DOWN } else { LPARAM_UP };
            let lparam = bits as isize;
            if down {
                let ok = PostMessageW(hwnd, WM_KEYDOWN, vk as usize, lparam) != 0;
                if ok && !key.is_modifier() {
                    PostMessageW(hwnd, WM_CHAR, vk as usize, lparam);
                }
                ok
            } else {
                PostMessageW(hwnd, WM_KEYUP, vk as usize, lparam) != 0
            }
        }
    }
}
