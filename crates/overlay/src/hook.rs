//! Window procedure hooks
//!
//! A hook replaces a window's message-handling entry point with a dispatch
//! trampoline. Handlers are offered each message newest-first; a message no
//! handler claims falls through to the procedure that was installed before
//! the first hook. Dropping a hook removes its handler, and removing the
//! last one restores the original procedure exactly, so LIFO disposal
//! restores every intermediate state.

use crate::{OverlayError, OverlayResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    CallWindowProcW, DefWindowProcW, SetWindowLongPtrW, GWLP_WNDPROC, WNDPROC,
};

/// Returns `Some(result)` to claim a message, `None` to decline it.
///
/// Handlers run inline with platform message dispatch: they must complete
/// quickly, must not block on I/O and must not re-enter window-management
/// APIs that could recursively dispatch to the same window.
pub type MessageHandler = Box<dyn FnMut(HWND, u32, WPARAM, LPARAM) -> Option<LRESULT>>;

struct HookEntry {
    id: u64,
    handler: MessageHandler,
}

struct WindowHooks {
    /// Entry point that was installed before the first hook
    original: isize,
    entries: Rc<RefCell<Vec<HookEntry>>>,
}

thread_local! {
    static HOOKS: RefCell<HashMap<isize, WindowHooks>> = RefCell::new(HashMap::new());
}

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Token for an installed message handler; dropping it uninstalls.
pub struct WindowProcHook {
    hwnd: isize,
    id: u64,
}

impl WindowProcHook {
    /// Install a handler in front of the window's current procedure. The
    /// first hook on a window swaps the procedure pointer; later hooks stack
    /// on top of it.
    pub fn install(hwnd: HWND, handler: MessageHandler) -> OverlayResult<Self> {
        let id = NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed);
        let key = hwnd.0 as isize;

        HOOKS.with(|hooks| {
            let mut map = hooks.borrow_mut();
            if let Some(window) = map.get(&key) {
                window.entries.borrow_mut().push(HookEntry { id, handler });
                return Ok(());
            }

            let original =
                unsafe { SetWindowLongPtrW(hwnd, GWLP_WNDPROC, hook_proc as usize as isize) };
            if original == 0 {
                return Err(OverlayError::HookInstall);
            }
            let entries = Rc::new(RefCell::new(vec![HookEntry { id, handler }]));
            map.insert(key, WindowHooks { original, entries });
            Ok(())
        })?;

        debug!(hwnd = key, id, "window hook installed");
        Ok(Self { hwnd: key, id })
    }
}

impl Drop for WindowProcHook {
    fn drop(&mut self) {
        HOOKS.with(|hooks| {
            let mut map = hooks.borrow_mut();
            let Some(window) = map.get(&self.hwnd) else {
                return;
            };
            window.entries.borrow_mut().retain(|entry| entry.id != self.id);
            if window.entries.borrow().is_empty() {
                let original = window.original;
                map.remove(&self.hwnd);
                unsafe {
                    SetWindowLongPtrW(
                        HWND(self.hwnd as *mut std::ffi::c_void),
                        GWLP_WNDPROC,
                        original,
                    );
                }
                debug!(hwnd = self.hwnd, "original window procedure restored");
            }
        });
    }
}

unsafe extern "system" fn hook_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let key = hwnd.0 as isize;
    let chain = HOOKS.with(|hooks| {
        hooks
            .borrow()
            .get(&key)
            .map(|window| (window.original, window.entries.clone()))
    });
    let Some((original, entries)) = chain else {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    };

    {
        let mut entries = entries.borrow_mut();
        for entry in entries.iter_mut().rev() {
            if let Some(result) = (entry.handler)(hwnd, msg, wparam, lparam) {
                return result;
            }
        }
    }

    let previous: WNDPROC = std::mem::transmute(original);
    CallWindowProcW(previous, hwnd, msg, wparam, lparam)
}
