//! The application window.
//!
//! winit requires the event loop to run on the main thread, so [`run`] moves the application
//! logic to a separate thread. Composed window images travel to the event loop through an
//! [`EventLoopProxy`], user commands travel back over a channel.

mod renderer;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use winit::{
    event::{ElementState, Event, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy},
};

use crate::app::Command;
use crate::image::{Image, Resolution};
use crate::ui::{self, Key, Layout};

use self::renderer::Renderer;

#[derive(Debug)]
enum Msg {
    Frame { res: Resolution, data: Vec<u8> },
}

/// The application thread's handle to the window.
pub struct Frontend {
    proxy: EventLoopProxy<Msg>,
    commands: Receiver<Command>,
}

impl Frontend {
    /// Presents a composed window image.
    ///
    /// Returns `false` if the event loop is gone.
    pub fn show(&self, image: &Image) -> bool {
        // Image data is RGBA8 internally, so no conversion before GPU upload is needed.
        self.proxy
            .send_event(Msg::Frame {
                res: image.resolution(),
                data: image.data().to_vec(),
            })
            .is_ok()
    }

    /// Returns all commands the user issued since the last call.
    pub fn commands(&self) -> impl Iterator<Item = Command> + '_ {
        self.commands.try_iter()
    }
}

fn key(code: VirtualKeyCode) -> Option<Key> {
    Some(match code {
        VirtualKeyCode::C => Key::Char('c'),
        VirtualKeyCode::R => Key::Char('r'),
        VirtualKeyCode::Space => Key::Space,
        VirtualKeyCode::Escape => Key::Escape,
        _ => return None,
    })
}

/// Opens the window and runs `app` on a background thread until it returns.
///
/// The process exits with status 0 when `app` returns `Ok`, 1 when it returns an error (which is
/// logged), and 101 when it panics.
pub fn run<F>(app: F) -> !
where
    F: FnOnce(Frontend) -> anyhow::Result<()> + Send + 'static,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let (cmd_sender, cmd_recv) = channel::unbounded();
    let frontend = Frontend {
        proxy: event_loop.create_proxy(),
        commands: cmd_recv,
    };

    let spawned = thread::Builder::new()
        .name("app".into())
        .spawn(move || match catch_unwind(AssertUnwindSafe(|| app(frontend))) {
            Ok(Ok(())) => process::exit(0),
            Ok(Err(e)) => {
                log::error!("{e:#}");
                process::exit(1);
            }
            // The panic hook has printed the message already; 101 mirrors libstd.
            Err(_payload) => process::exit(101),
        });
    if let Err(e) = spawned {
        log::error!("failed to spawn application thread: {e}");
        process::exit(1);
    }

    let mut renderer = match Renderer::open(&event_loop, ui::WINDOW_TITLE, ui::WINDOW_SIZE) {
        Ok(renderer) => renderer,
        Err(e) => {
            log::error!("failed to open window: {e:#}");
            process::exit(1);
        }
    };
    let layout = Layout::new();
    let mut cursor = None;
    let send = move |sender: &Sender<Command>, cmd: Command| {
        log::debug!("command: {cmd:?}");
        sender.send(cmd).ok();
    };

    event_loop.run(move |event, _target, flow| {
        *flow = ControlFlow::Wait;
        match event {
            Event::UserEvent(Msg::Frame { res, data }) => {
                renderer.update_texture(res, &data);
                renderer.window().request_redraw();
            }
            Event::RedrawRequested(_) => {
                if let Err(e) = renderer.redraw() {
                    log::error!("failed to redraw window: {e:#}");
                }
            }
            Event::WindowEvent { event, .. } => match event {
                // The app thread finalizes its output and exits the process.
                WindowEvent::CloseRequested => send(&cmd_sender, Command::Quit),
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = Some((position.x as f32, position.y as f32));
                }
                WindowEvent::CursorLeft { .. } => cursor = None,
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    button: MouseButton::Left,
                    ..
                } => {
                    if let Some(cmd) = cursor.and_then(|(x, y)| layout.hit(x, y)) {
                        send(&cmd_sender, cmd);
                    }
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(code),
                            ..
                        },
                    ..
                } => {
                    if let Some(cmd) = key(code).and_then(ui::key_command) {
                        send(&cmd_sender, cmd);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    })
}
