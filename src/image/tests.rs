use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let data = data
        .into_iter()
        .flat_map(|row| row.into_iter())
        .flat_map(|col| col.0)
        .collect::<Vec<_>>();
    Image::from_rgba8(Resolution::new(W as u32, H as u32), &data)
}

#[test]
fn get_set() {
    let mut image = mkimage([[C::RED, C::GREEN], [C::BLUE, C::WHITE]]);
    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(1, 1), C::WHITE);
    image.set(1, 0, C::YELLOW);
    assert_eq!(image.get(1, 0), C::YELLOW);

    assert_eq!(image.get_or_null(-1, 0), C::NULL);
    assert_eq!(image.get_or_null(0, 2), C::NULL);
    assert_eq!(image.get_or_null(0, 1), C::BLUE);
}

#[test]
#[should_panic]
fn from_rgba8_wrong_size() {
    Image::from_rgba8(Resolution::new(2, 2), &[0; 15]);
}

#[test]
fn clear_and_data() {
    let mut image = Image::new(3, 2);
    assert!(image.data().iter().all(|&b| b == 0));
    image.clear(C::CYAN);
    assert_eq!(image.data().len(), 3 * 2 * 4);
    assert!(image.data().chunks(4).all(|px| px == [0, 255, 255, 255]));
}

#[test]
fn blit_clips() {
    let mut dest = Image::filled(Resolution::new(3, 3), C::BLACK);
    let src = Image::filled(Resolution::new(2, 2), C::RED);

    dest.blit(&src, 2, -1);
    #[rustfmt::skip]
    let expected = mkimage([
        [C::BLACK, C::BLACK, C::RED],
        [C::BLACK, C::BLACK, C::BLACK],
        [C::BLACK, C::BLACK, C::BLACK],
    ]);
    assert_eq!(dest.data(), expected.data());
}

#[test]
fn resize() {
    let image = Image::filled(Resolution::new(8, 4), C::GREEN);
    let resized = image.resize(Resolution::new(4, 2));
    assert_eq!(resized.resolution(), Resolution::new(4, 2));
    assert!(resized.data().chunks(4).all(|px| px == [0, 255, 0, 255]));

    let same = image.resize(image.resolution());
    assert_eq!(same.data(), image.data());
}

#[test]
fn jpeg_roundtrip_keeps_size() {
    let mut image = Image::filled(Resolution::new(16, 8), C::WHITE);
    draw::rect(&mut image, Rect::from_top_left(0.0, 0.0, 8.0, 8.0))
        .color(C::BLACK)
        .filled(true);

    let jpeg = image.encode_jpeg(95).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let decoded = Image::decode_jpeg(&jpeg).unwrap();
    assert_eq!(decoded.resolution(), image.resolution());
    assert!(decoded.get(12, 4).r() > 200);
    assert!(decoded.get(3, 4).r() < 50);
}

#[test]
fn decode_garbage_fails() {
    assert!(Image::decode_jpeg(b"definitely not a jpeg").is_err());
}

#[test]
fn save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::filled(Resolution::new(4, 4), C::MAGENTA);

    let png = dir.path().join("out.png");
    image.save(&png).unwrap();
    let loaded = Image::load(&png).unwrap();
    assert_eq!(loaded.data(), image.data());

    let jpg = dir.path().join("out.jpg");
    image.save_with_quality(&jpg, 80).unwrap();
    assert_eq!(Image::load(&jpg).unwrap().resolution(), image.resolution());

    let err = image.save(dir.path().join("out.bmp")).unwrap_err();
    assert!(format!("{err:#}").contains("supported extensions"));
}

#[test]
fn draw_filled_circle() {
    let mut image = Image::filled(Resolution::new(11, 11), C::BLACK);
    draw::circle(&mut image, 5, 5, 7).color(C::RED).filled(true);
    assert_eq!(image.get(5, 5), C::RED);
    assert_eq!(image.get(5, 3), C::RED);
    assert_eq!(image.get(0, 0), C::BLACK);
    assert_eq!(image.get(10, 10), C::BLACK);
}

#[test]
fn draw_line_and_marker() {
    let mut image = Image::filled(Resolution::new(5, 5), C::BLACK);
    draw::line(&mut image, 0, 2, 4, 2).color(C::WHITE);
    for x in 0..5 {
        assert_eq!(image.get(x, 2), C::WHITE);
    }
    assert_eq!(image.get(0, 0), C::BLACK);

    let mut image = Image::filled(Resolution::new(5, 5), C::BLACK);
    draw::marker(&mut image, 2, 2).color(C::GREEN).size(3);
    assert_eq!(image.get(1, 1), C::GREEN);
    assert_eq!(image.get(3, 1), C::GREEN);
    assert_eq!(image.get(2, 1), C::BLACK);
}

#[test]
fn drawing_out_of_bounds_is_clipped() {
    let mut image = Image::filled(Resolution::new(4, 4), C::BLACK);
    draw::circle(&mut image, -20, -20, 9).filled(true);
    draw::line(&mut image, -10, 1, 20, 1).color(C::BLUE);
    draw::text(&mut image, 100, 100, "clipped");
    assert_eq!(image.get(0, 0), C::BLACK);
    assert_eq!(image.get(3, 1), C::BLUE);
}

#[test]
fn draw_text_changes_pixels() {
    let mut image = Image::filled(Resolution::new(60, 30), C::BLACK);
    draw::text(&mut image, 30, 15, "Ready")
        .color(C::WHITE)
        .font(draw::FontSize::Large);
    assert!(image.data().chunks(4).any(|px| px == [255, 255, 255, 255]));
}

#[test]
fn rect_outline_is_hollow() {
    let mut image = Image::filled(Resolution::new(6, 6), C::BLACK);
    draw::rect(&mut image, Rect::from_top_left(0.0, 0.0, 6.0, 6.0)).color(C::YELLOW);
    assert_eq!(image.get(0, 0), C::YELLOW);
    assert_eq!(image.get(5, 5), C::YELLOW);
    assert_eq!(image.get(3, 3), C::BLACK);
}

#[test]
fn bgr_colors() {
    assert_eq!(Color::from_bgr8(245, 117, 66), Color::from_rgb8(66, 117, 245));
    assert_eq!(format!("{:?}", C::ORANGE), "#ffa500ff");
}
