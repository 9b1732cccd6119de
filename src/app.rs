//! Application shell: toolbar, canvas panel and the glue between egui events
//! and the viewport controller. All editing state lives in the controller;
//! this layer only forwards input and paints the result.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use eframe::egui;
use egui::{
    Color32, ColorImage, CursorIcon, Pos2, Rect, TextureFilter, TextureHandle, TextureOptions,
    Vec2,
};
use image::Rgba;

use crate::io::{self, LoadOutcome, SaveOutcome};
use crate::raster::SaveFormat;
use crate::settings::AppSettings;
use crate::viewport::{Mode, ViewportController};
use crate::{log_err, log_info};

/// Canvas background behind and around the image.
const CANVAS_BACKDROP: Color32 = Color32::from_gray(32);
/// Crop selection accent (stroke + faint fill).
const SELECTION_STROKE: Color32 = Color32::from_rgb(66, 133, 244);
const SELECTION_FILL: Color32 = Color32::from_rgba_premultiplied(13, 26, 48, 40);

/// Fallback viewport used before the first frame has measured the canvas.
fn default_canvas_rect() -> Rect {
    Rect::from_min_size(Pos2::ZERO, Vec2::new(1000.0, 600.0))
}

pub struct PicViewApp {
    viewer: ViewportController,
    settings: AppSettings,

    texture: Option<TextureHandle>,
    last_nearest_filter: Option<bool>,
    last_canvas_rect: Option<Rect>,

    load_tx: mpsc::Sender<LoadOutcome>,
    load_rx: mpsc::Receiver<LoadOutcome>,
    /// Bumped for every load the user starts; only a result carrying the
    /// current generation is accepted, so the latest open always wins.
    load_generation: u64,
    load_in_flight: bool,

    save_tx: mpsc::Sender<SaveOutcome>,
    save_rx: mpsc::Receiver<SaveOutcome>,
    save_in_flight: bool,

    current_path: Option<PathBuf>,
    status: String,
}

impl PicViewApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let mut viewer = ViewportController::new();
        viewer.brush_color = settings.brush_color;
        viewer.brush_width = settings.brush_width;

        let (load_tx, load_rx) = mpsc::channel();
        let (save_tx, save_rx) = mpsc::channel();

        Self {
            viewer,
            settings,
            texture: None,
            last_nearest_filter: None,
            last_canvas_rect: None,
            load_tx,
            load_rx,
            load_generation: 0,
            load_in_flight: false,
            save_tx,
            save_rx,
            save_in_flight: false,
            current_path: None,
            status: String::from("Open an image to get started"),
        }
    }

    fn canvas_rect(&self) -> Rect {
        self.last_canvas_rect.unwrap_or_else(default_canvas_rect)
    }

    fn begin_load(&mut self, path: PathBuf) {
        self.load_generation += 1;
        self.load_in_flight = true;
        self.status = format!("Loading {}…", path.display());
        io::start_load(path, self.load_generation, self.load_tx.clone());
    }

    fn begin_save(&mut self, path: PathBuf) {
        let Some(buffer) = self.viewer.buffer() else {
            return;
        };
        let format = SaveFormat::from_path(&path);
        // Snapshot by value: edits made while the encoder runs can't tear
        // the written file.
        let snapshot = buffer.clone();
        self.save_in_flight = true;
        self.status = format!("Saving {}…", path.display());
        io::start_save(snapshot, path, format, self.save_tx.clone());
    }

    fn poll_io(&mut self) {
        while let Ok(outcome) = self.load_rx.try_recv() {
            if outcome.generation != self.load_generation {
                log_info!("Discarding stale load of {:?}", outcome.path);
                continue;
            }
            self.load_in_flight = false;
            match outcome.result {
                Ok(buffer) => {
                    log_info!(
                        "Loaded {:?} ({}x{})",
                        outcome.path,
                        buffer.width(),
                        buffer.height()
                    );
                    self.status = format!(
                        "Loaded {} ({}×{})",
                        outcome.path.display(),
                        buffer.width(),
                        buffer.height()
                    );
                    self.viewer.set_image(buffer, self.canvas_rect());
                    self.current_path = Some(outcome.path);
                }
                Err(e) => {
                    // Prior image (if any) stays as it was
                    log_err!("Failed to load {:?}: {}", outcome.path, e);
                    self.status = format!("Could not open {}: {}", outcome.path.display(), e);
                }
            }
        }

        while let Ok(outcome) = self.save_rx.try_recv() {
            self.save_in_flight = false;
            match outcome.result {
                Ok(()) => {
                    log_info!("Saved {:?}", outcome.path);
                    self.status = format!("Saved {}", outcome.path.display());
                }
                Err(e) => {
                    log_err!("Failed to save {:?}: {}", outcome.path, e);
                    self.status = format!("Save failed: {}", e);
                }
            }
        }
    }

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open").clicked()
                && let Some(path) = io::pick_open_path()
            {
                self.begin_load(path);
            }

            let can_save = self.viewer.has_image() && !self.save_in_flight;
            if ui.add_enabled(can_save, egui::Button::new("Save As")).clicked()
                && let Some(path) = io::pick_save_path()
            {
                self.begin_save(path);
            }

            ui.separator();

            for mode in Mode::all() {
                if ui
                    .selectable_label(self.viewer.mode() == *mode, mode.label())
                    .clicked()
                {
                    self.viewer.set_mode(*mode);
                }
            }

            ui.separator();

            ui.label("Color:");
            let c = self.viewer.brush_color;
            let mut color = Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]);
            if ui.color_edit_button_srgba(&mut color).changed() {
                let rgba = Rgba([color.r(), color.g(), color.b(), color.a()]);
                self.viewer.brush_color = rgba;
                self.settings.brush_color = rgba;
                self.settings.save();
            }

            ui.label("Width:");
            let mut width = self.viewer.brush_width;
            if ui
                .add(egui::DragValue::new(&mut width).clamp_range(1..=50).suffix(" px"))
                .changed()
            {
                self.viewer.brush_width = width;
                self.settings.brush_width = width;
                self.settings.save();
            }

            ui.separator();

            let can_reset = self.viewer.has_image();
            if ui.add_enabled(can_reset, egui::Button::new("Reset")).clicked() {
                self.viewer.reset_to_source(self.canvas_rect());
                self.status = String::from("Restored original image");
            }
        });
    }

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let sense = egui::Sense::click_and_drag().union(egui::Sense::hover());
        let (response, painter) = ui.allocate_painter(ui.available_size(), sense);
        let canvas_rect = response.rect;
        self.last_canvas_rect = Some(canvas_rect);

        let ctx = ui.ctx();

        // ---- input ----------------------------------------------------------
        let pointer_pos = ctx.input(|i| i.pointer.interact_pos());
        let pressed = ctx.input(|i| i.pointer.primary_pressed());
        let down = ctx.input(|i| i.pointer.primary_down());
        let released = ctx.input(|i| i.pointer.primary_released());

        if let Some(pos) = pointer_pos {
            if pressed && canvas_rect.contains(pos) {
                self.viewer.pointer_down(pos, canvas_rect);
            } else if released {
                self.viewer.pointer_up(pos, canvas_rect);
            } else if down {
                self.viewer.pointer_move(pos);
            }
        }

        let scroll_y = ctx.input(|i| i.scroll_delta.y);
        if scroll_y.abs() > 0.1
            && let Some(pos) = ctx.input(|i| i.pointer.hover_pos())
            && canvas_rect.contains(pos)
        {
            self.viewer.wheel_zoom(scroll_y, pos);
        }

        if response.hovered() {
            let icon = if self.viewer.mode() == Mode::View && down {
                CursorIcon::Grabbing
            } else {
                self.viewer.mode().cursor_icon()
            };
            ctx.set_cursor_icon(icon);
        }

        // ---- texture upload -------------------------------------------------
        let nearest = self.settings.sharp_zoom && self.viewer.transform.scale >= 2.0;
        let filter_changed = self.last_nearest_filter.is_some_and(|last| last != nearest);
        self.last_nearest_filter = Some(nearest);
        let options = TextureOptions {
            magnification: if nearest {
                TextureFilter::Nearest
            } else {
                TextureFilter::Linear
            },
            minification: TextureFilter::Linear,
        };

        let pixels_dirty = self.viewer.take_dirty();
        if let Some(buffer) = self.viewer.buffer() {
            if pixels_dirty || filter_changed || self.texture.is_none() {
                let img = rgba_to_color_image(buffer.as_rgba());
                match self.texture.as_mut() {
                    Some(tex) => tex.set(img, options),
                    None => self.texture = Some(ctx.load_texture("picview_image", img, options)),
                }
            }
        } else {
            self.texture = None;
        }

        // ---- paint ----------------------------------------------------------
        painter.rect_filled(canvas_rect, 0.0, CANVAS_BACKDROP);

        if let (Some(texture), Some(image_rect)) = (self.texture.as_ref(), self.viewer.image_rect())
        {
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            painter.image(texture.id(), image_rect, uv, Color32::WHITE);
        } else {
            painter.text(
                canvas_rect.center(),
                egui::Align2::CENTER_CENTER,
                "No image loaded",
                egui::FontId::proportional(18.0),
                Color32::from_gray(140),
            );
        }

        // Live crop selection, drawn in viewport space so it never scales
        // with the content
        if let Some(selection) = self.viewer.crop_overlay() {
            painter.rect_filled(selection, 0.0, SELECTION_FILL);
            painter.rect_stroke(selection, 0.0, egui::Stroke::new(1.5, SELECTION_STROKE));
        }
    }

    fn show_status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(&self.status);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if self.viewer.has_image() {
                    ui.label(format!("{:.0}%", self.viewer.transform.scale * 100.0));
                    ui.label(self.viewer.mode().label());
                }
            });
        });
    }
}

impl eframe::App for PicViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_io();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.show_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.show_status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_canvas(ui);
        });

        // Worker threads can't wake the event loop themselves — keep polling
        // while something is in flight.
        if self.load_in_flight || self.save_in_flight {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// Convert the buffer's pixels into egui's texture format.
fn rgba_to_color_image(img: &image::RgbaImage) -> ColorImage {
    let size = [img.width() as usize, img.height() as usize];
    let pixels = img
        .as_raw()
        .chunks_exact(4)
        .map(|c| Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]))
        .collect();
    ColorImage { size, pixels }
}
