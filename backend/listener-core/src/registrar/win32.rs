//! Win32 backend: a hidden top-level window per endpoint.
//!
//! Acquisition registers a window class under a fresh label and creates a
//! window of that class titled with the server name. Clients locate it by
//! title and deliver envelopes with `WM_COPYDATA`, whose `dwData` is the tag.
//!
//! `WM_COPYDATA` is a sent message: Windows calls the window procedure from
//! inside `GetMessageW` on the owning thread, so routing happens in the
//! window procedure and `retrieve` only reports whether `WM_QUIT` arrived.

use crate::dispatcher::Dispatcher;
use crate::error::{EndpointError, SendError};
use crate::identity::ServerIdentity;
use crate::protocol::Envelope;
use crate::protocol::frame::MAX_PAYLOAD;
use crate::registrar::class_table::ClassTable;
use crate::registrar::{Endpoint, EnvelopeSender, QuitPoster, Registrar, Retrieved};
use crate::CLASS_LABEL_PREFIX;

use common::ErrorLocation;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Error as IoError;
use std::panic::Location;
use std::ptr::{null, null_mut};

use log::{debug, warn};
use once_cell::sync::Lazy;
use windows_sys::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::DataExchange::COPYDATASTRUCT;
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CW_USEDEFAULT, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    FindWindowExW, GetClassNameW, GetMessageW, MSG, PostMessageW, RegisterClassExW, SendMessageW,
    TranslateMessage, UnregisterClassW, WM_COPYDATA, WM_QUIT, WNDCLASSEXW, WS_CAPTION,
    WS_POPUPWINDOW,
};

const CLASS_NAME_CAPACITY: usize = 256;

static CLASS_TABLE: Lazy<ClassTable> = Lazy::new(ClassTable::new);

thread_local! {
    // Window handle -> dispatcher, for windows owned by this thread.
    static DISPATCHERS: RefCell<HashMap<usize, Dispatcher>> = RefCell::new(HashMap::new());
}

/// Class labels registered by Win32 endpoints in this process.
pub fn registered_classes() -> &'static ClassTable {
    &CLASS_TABLE
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn module_handle() -> HINSTANCE {
    unsafe { GetModuleHandleW(null()) }
}

fn class_name_of(hwnd: HWND) -> String {
    let mut buffer = [0u16; CLASS_NAME_CAPACITY];
    let len = unsafe { GetClassNameW(hwnd, buffer.as_mut_ptr(), buffer.len() as i32) };
    String::from_utf16_lossy(&buffer[..len.max(0) as usize])
}

/// First top-level window titled `name` whose class carries the protocol prefix.
fn find_endpoint_window(name: &str) -> Option<HWND> {
    let title = wide(name);
    let mut after: HWND = null_mut();

    loop {
        let hwnd = unsafe { FindWindowExW(null_mut(), after, null(), title.as_ptr()) };
        if hwnd.is_null() {
            return None;
        }
        if class_name_of(hwnd).starts_with(CLASS_LABEL_PREFIX) {
            return Some(hwnd);
        }
        after = hwnd;
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if message == WM_COPYDATA && lparam != 0 {
        let dispatcher = DISPATCHERS.with(|map| map.borrow().get(&(hwnd as usize)).cloned());
        if let Some(dispatcher) = dispatcher {
            let data = unsafe { &*(lparam as *const COPYDATASTRUCT) };
            let payload = if data.lpData.is_null() || data.cbData == 0 {
                Vec::new()
            } else {
                unsafe {
                    std::slice::from_raw_parts(data.lpData as *const u8, data.cbData as usize)
                }
                .to_vec()
            };
            let tag = u32::try_from(data.dwData).unwrap_or(u32::MAX);
            dispatcher.route(&Envelope::new(tag, payload));
            return 1;
        }
    }

    unsafe { DefWindowProcW(hwnd, message, wparam, lparam) }
}

/// Registrar creating hidden message windows.
#[derive(Debug, Clone, Default)]
pub struct Win32Registrar;

impl Win32Registrar {
    pub fn new() -> Self {
        Self
    }
}

impl Registrar for Win32Registrar {
    type Endpoint = Win32Endpoint;

    fn backend(&self) -> &'static str {
        "win32"
    }

    fn acquire(
        &self,
        identity: &ServerIdentity,
        dispatcher: Dispatcher,
    ) -> Result<Win32Endpoint, EndpointError> {
        if find_endpoint_window(identity.as_str()).is_some() {
            return Err(EndpointError::NameInUse {
                message: format!("A window for '{identity}' already exists"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let class_label = CLASS_TABLE.register(identity)?;
        let class_wide = wide(&class_label);
        let title_wide = wide(identity.as_str());
        let instance = module_handle();

        let mut class: WNDCLASSEXW = unsafe { std::mem::zeroed() };
        class.cbSize = std::mem::size_of::<WNDCLASSEXW>() as u32;
        class.lpfnWndProc = Some(window_proc);
        class.hInstance = instance;
        class.lpszClassName = class_wide.as_ptr();

        if unsafe { RegisterClassExW(&class) } == 0 {
            let os_error = IoError::last_os_error();
            if let Err(e) = CLASS_TABLE.unregister(&class_label) {
                warn!("Failed to forget {class_label}: {e}");
            }
            return Err(EndpointError::Create {
                message: format!("RegisterClassExW({class_label}) failed: {os_error}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let hwnd = unsafe {
            CreateWindowExW(
                0,
                class_wide.as_ptr(),
                title_wide.as_ptr(),
                WS_POPUPWINDOW | WS_CAPTION,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                null_mut(),
                null_mut(),
                instance,
                null(),
            )
        };

        if hwnd.is_null() {
            let os_error = IoError::last_os_error();
            unsafe { UnregisterClassW(class_wide.as_ptr(), instance) };
            if let Err(e) = CLASS_TABLE.unregister(&class_label) {
                warn!("Failed to forget {class_label}: {e}");
            }
            return Err(EndpointError::Create {
                message: format!("CreateWindowExW for '{identity}' failed: {os_error}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        DISPATCHERS.with(|map| map.borrow_mut().insert(hwnd as usize, dispatcher));
        debug!("Created window for '{identity}' ({class_label})");

        Ok(Win32Endpoint {
            identity: identity.clone(),
            class_label,
            class_wide,
            instance,
            hwnd,
            released: false,
        })
    }
}

/// A registered window class and the window created from it.
///
/// Holds a raw `HWND`, which keeps it on the creating thread.
pub struct Win32Endpoint {
    identity: ServerIdentity,
    class_label: String,
    class_wide: Vec<u16>,
    instance: HINSTANCE,
    hwnd: HWND,
    released: bool,
}

impl Win32Endpoint {
    fn teardown(&mut self) -> Vec<EndpointError> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        DISPATCHERS.with(|map| map.borrow_mut().remove(&(self.hwnd as usize)));

        let mut errors = Vec::new();

        // The window goes first: a class with a live window cannot be
        // unregistered.
        if unsafe { DestroyWindow(self.hwnd) } == 0 {
            errors.push(EndpointError::Destroy {
                message: format!(
                    "DestroyWindow for '{}' failed: {}",
                    self.identity,
                    IoError::last_os_error()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if unsafe { UnregisterClassW(self.class_wide.as_ptr(), self.instance) } == 0 {
            errors.push(EndpointError::Unregister {
                message: format!(
                    "UnregisterClassW({}) failed: {}",
                    self.class_label,
                    IoError::last_os_error()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Err(e) = CLASS_TABLE.unregister(&self.class_label) {
            errors.push(e);
        }

        errors
    }
}

impl Endpoint for Win32Endpoint {
    fn class_label(&self) -> &str {
        &self.class_label
    }

    fn quit_poster(&self) -> Result<Box<dyn QuitPoster>, EndpointError> {
        Ok(Box::new(Win32QuitPoster {
            hwnd: self.hwnd as usize,
        }))
    }

    fn retrieve(&mut self) -> Result<Retrieved, EndpointError> {
        let mut msg: MSG = unsafe { std::mem::zeroed() };

        match unsafe { GetMessageW(&mut msg, null_mut(), 0, 0) } {
            0 => Ok(Retrieved::Quit),
            -1 => Err(EndpointError::Retrieve {
                message: format!("GetMessageW failed: {}", IoError::last_os_error()),
                location: ErrorLocation::from(Location::caller()),
            }),
            _ => {
                unsafe {
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
                Ok(Retrieved::Continue)
            }
        }
    }

    fn release(mut self) -> Vec<EndpointError> {
        self.teardown()
    }
}

impl Drop for Win32Endpoint {
    fn drop(&mut self) {
        for error in self.teardown() {
            warn!("Win32 endpoint teardown on drop: {error}");
        }
    }
}

struct Win32QuitPoster {
    hwnd: usize,
}

impl QuitPoster for Win32QuitPoster {
    fn post_quit(&self) -> Result<(), EndpointError> {
        if unsafe { PostMessageW(self.hwnd as HWND, WM_QUIT, 0, 0) } == 0 {
            return Err(EndpointError::Post {
                message: format!("PostMessageW(WM_QUIT) failed: {}", IoError::last_os_error()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }
}

/// Client handle for a window found by title.
pub struct Win32Sender {
    hwnd: usize,
}

impl Win32Sender {
    /// Locate the endpoint window named `name`.
    #[track_caller]
    pub fn find(name: &str) -> Result<Self, SendError> {
        find_endpoint_window(name)
            .map(|hwnd| Self {
                hwnd: hwnd as usize,
            })
            .ok_or_else(|| SendError::NotFound {
                message: format!("No window for server '{name}'"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl EnvelopeSender for Win32Sender {
    #[track_caller]
    fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        if envelope.payload.len() > MAX_PAYLOAD {
            return Err(SendError::Oversized {
                message: format!(
                    "Payload of {} bytes exceeds the {MAX_PAYLOAD}-byte limit",
                    envelope.payload.len()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let data = COPYDATASTRUCT {
            dwData: envelope.tag as usize,
            cbData: envelope.payload.len() as u32,
            lpData: envelope.payload.as_ptr() as *mut _,
        };

        let handled = unsafe {
            SendMessageW(
                self.hwnd as HWND,
                WM_COPYDATA,
                0,
                &data as *const COPYDATASTRUCT as LPARAM,
            )
        };

        if handled == 0 {
            return Err(SendError::NotFound {
                message: "Window did not accept WM_COPYDATA".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }
}
