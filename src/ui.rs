//! Window layout and rendering.
//!
//! The whole window is composed into one [`Image`] by [`render`], which the GUI then presents.
//! Mouse clicks are resolved with [`Layout::hit`], key presses with [`key_command`].

use crate::app::{AppView, Command};
use crate::image::draw::{self, FontSize};
use crate::image::{Color, Image, Rect, Resolution};

pub const WINDOW_TITLE: &str = "Landmark Detection System";
pub const WINDOW_SIZE: Resolution = Resolution::new(900, 700);
pub const VIDEO_SIZE: Resolution = Resolution::VGA;
pub const BUTTON_SIZE: Resolution = Resolution::new(200, 40);

const MARGIN: u32 = 20;
const BUTTON_GAP: u32 = 40;
const STATUS_Y: i32 = 600;
const ACTION_Y: i32 = 640;

const BACKGROUND: Color = Color::from_rgb8(36, 36, 36);
const VIDEO_BACKGROUND: Color = Color::BLACK;
const BUTTON: Color = Color::from_rgb8(31, 106, 165);
const BUTTON_ACTIVE: Color = Color::from_rgb8(176, 38, 38);
const BUTTON_TEXT: Color = Color::WHITE;
const PLACEHOLDER_TEXT: Color = Color::GRAY;

/// Positions of the window's elements, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub video: Rect,
    pub capture_button: Rect,
    pub record_button: Rect,
}

impl Layout {
    pub fn new() -> Self {
        let center_x = WINDOW_SIZE.width() as f32 / 2.0;
        let video = Rect::from_top_left(
            center_x - VIDEO_SIZE.width() as f32 / 2.0,
            MARGIN as f32,
            VIDEO_SIZE.width() as f32,
            VIDEO_SIZE.height() as f32,
        );

        let button_y = video.y_max() + MARGIN as f32;
        let (bw, bh) = (BUTTON_SIZE.width() as f32, BUTTON_SIZE.height() as f32);
        let row_width = 2.0 * bw + BUTTON_GAP as f32;
        let capture_button = Rect::from_top_left(center_x - row_width / 2.0, button_y, bw, bh);
        let record_button = capture_button.move_by(bw + BUTTON_GAP as f32, 0.0);

        Self {
            video,
            capture_button,
            record_button,
        }
    }

    /// Returns the command triggered by a click at `(x, y)`, if any.
    pub fn hit(&self, x: f32, y: f32) -> Option<Command> {
        if self.capture_button.contains_point(x, y) {
            Some(Command::Capture)
        } else if self.record_button.contains_point(x, y) {
            Some(Command::ToggleRecording)
        } else {
            None
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys the UI reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Space,
    Escape,
}

/// Maps a key press to a command: `C` captures, `R` or space toggles recording, escape quits.
pub fn key_command(key: Key) -> Option<Command> {
    match key {
        Key::Char('c' | 'C') => Some(Command::Capture),
        Key::Char('r' | 'R') | Key::Space => Some(Command::ToggleRecording),
        Key::Escape => Some(Command::Quit),
        Key::Char(_) => None,
    }
}

fn center(rect: Rect) -> (i32, i32) {
    let [x, y] = rect.center();
    (x.round() as i32, y.round() as i32)
}

fn button(image: &mut Image, rect: Rect, label: &str, color: Color) {
    draw::rect(image, rect).color(color).filled(true);
    let (x, y) = center(rect);
    draw::text(image, x, y, label)
        .color(BUTTON_TEXT)
        .font(FontSize::Large);
}

/// Composes the whole window.
pub fn render(layout: &Layout, view: &AppView<'_>) -> Image {
    let mut image = Image::filled(WINDOW_SIZE, BACKGROUND);

    let (vx, vy) = (layout.video.x() as i64, layout.video.y() as i64);
    match view.frame {
        Some(frame) => image.blit(&frame.resize(VIDEO_SIZE), vx, vy),
        None => {
            image.blit(&Image::filled(VIDEO_SIZE, VIDEO_BACKGROUND), vx, vy);
            let (x, y) = center(layout.video);
            draw::text(&mut image, x, y, "Waiting for video")
                .color(PLACEHOLDER_TEXT)
                .font(FontSize::Large);
        }
    }

    button(&mut image, layout.capture_button, "Capture Image", BUTTON);
    let record_color = if view.recording {
        BUTTON_ACTIVE
    } else {
        BUTTON
    };
    button(
        &mut image,
        layout.record_button,
        view.record_button_label(),
        record_color,
    );

    let x = WINDOW_SIZE.width() as i32 / 2;
    draw::text(&mut image, x, STATUS_Y, &view.status.text)
        .color(view.status.tone.color())
        .font(FontSize::Large);
    let action = view.action_label();
    draw::text(&mut image, x, ACTION_Y, &action)
        .color(Color::CYAN)
        .font(FontSize::Large);

    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::app::{Status, Tone};

    #[test]
    fn layout_fits_window() {
        let layout = Layout::new();
        let window = WINDOW_SIZE.rect();
        for rect in [layout.video, layout.capture_button, layout.record_button] {
            assert_eq!(window.intersection(&rect), Some(rect));
        }
        assert_eq!(layout.video.x(), 130.0);
        assert_eq!(layout.capture_button.width(), 200.0);
        assert_eq!(layout.capture_button.y(), layout.record_button.y());
        assert_eq!(layout.capture_button.intersection(&layout.record_button), None);
    }

    #[test]
    fn hit_testing() {
        let layout = Layout::new();
        let [cx, cy] = layout.capture_button.center();
        let [rx, ry] = layout.record_button.center();
        assert_eq!(layout.hit(cx, cy), Some(Command::Capture));
        assert_eq!(layout.hit(rx, ry), Some(Command::ToggleRecording));
        assert_eq!(layout.hit(5.0, 5.0), None);
        let [vx, vy] = layout.video.center();
        assert_eq!(layout.hit(vx, vy), None);
    }

    #[test]
    fn keys() {
        assert_eq!(key_command(Key::Char('c')), Some(Command::Capture));
        assert_eq!(key_command(Key::Char('R')), Some(Command::ToggleRecording));
        assert_eq!(key_command(Key::Space), Some(Command::ToggleRecording));
        assert_eq!(key_command(Key::Escape), Some(Command::Quit));
        assert_eq!(key_command(Key::Char('x')), None);
    }

    #[test]
    fn renders_frame_and_controls() {
        let layout = Layout::new();
        let frame = Image::filled(Resolution::new(320, 240), Color::MAGENTA);
        let status = Status::new("Pose detected", Tone::Success);
        let view = AppView {
            frame: Some(&frame),
            status: &status,
            action: Action::Standing,
            recording: true,
        };
        let image = render(&layout, &view);

        assert_eq!(image.resolution(), WINDOW_SIZE);
        assert_eq!(image.get(0, 0), BACKGROUND);
        let (vx, vy) = center(layout.video);
        assert_eq!(image.get(vx as u32, vy as u32), Color::MAGENTA);
        let b = layout.record_button;
        assert_eq!(image.get(b.x() as u32 + 2, b.y() as u32 + 2), BUTTON_ACTIVE);
        let b = layout.capture_button;
        assert_eq!(image.get(b.x() as u32 + 2, b.y() as u32 + 2), BUTTON);
    }
}
