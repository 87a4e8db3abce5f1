//! egui overlay: menu bar, info panel, player bar, loading overlay and the
//! track labels floating above each planet.

use crate::camera::OrbitCamera;
use crate::planets::{LABEL_SIZE, LibrarySource, LoadLibrary, LoadingState, PlanetLabel};
use crate::playback::{PlaybackCommand, PlaybackState, PlaybackStatus};
use crate::registry::{PlanetId, SceneRegistry};
use crate::selection::SelectPlanet;
use crate::waveform::{WaveformData, played_bars, seek_fraction};
use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use rfd::FileDialog;
use std::path::PathBuf;
use tracing::info;
use tunesphere_core::Rgb;

/// Plugin that adds the egui overlay
pub struct PanelPlugin;

impl Plugin for PanelPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default())
            .init_resource::<InfoPanel>()
            .init_resource::<PointerOverUi>()
            .init_resource::<FileDialogState>()
            .add_systems(
                EguiPrimaryContextPass,
                (
                    menu_bar_system,
                    info_panel_system,
                    player_bar_system,
                    loading_overlay_system,
                    planet_labels_system,
                    track_pointer_system,
                )
                    .chain(),
            )
            .add_systems(Update, file_dialog_poll_system);
    }
}

/// Whether the pointer is over an egui area, so scene clicks are ignored
#[derive(Resource, Debug, Default)]
pub struct PointerOverUi(pub bool);

/// One entry of the "Connected Songs" list
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedSong {
    pub id: PlanetId,
    pub name: String,
    pub artist: String,
    pub genre: String,
    pub color: Rgb,
}

/// Contents of the info panel for a selected planet
#[derive(Debug, Clone, PartialEq)]
pub struct PanelContent {
    pub planet: PlanetId,
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub color: Rgb,
    pub connected: Vec<ConnectedSong>,
}

impl PanelContent {
    /// Describe `planet` and its neighbors; `None` if `planet` is unknown
    pub fn build(registry: &SceneRegistry, planet: PlanetId, neighbors: &[PlanetId]) -> Option<Self> {
        let selected = registry.get(planet)?;
        let connected = neighbors
            .iter()
            .filter_map(|&id| {
                let info = &registry.get(id)?.info;
                Some(ConnectedSong {
                    id,
                    name: info.name.clone(),
                    artist: info.artist.clone(),
                    genre: info.genre.clone(),
                    color: info.color,
                })
            })
            .collect();

        Some(Self {
            planet,
            title: selected.info.name.clone(),
            artist: selected.info.artist.clone(),
            genre: selected.info.genre.clone(),
            color: selected.info.color,
            connected,
        })
    }
}

/// What the info panel shows
#[derive(Resource, Debug, Default)]
pub struct InfoPanel {
    content: Option<PanelContent>,
    /// Bumped on every rebuild
    revision: u64,
}

impl InfoPanel {
    /// Replace the panel contents
    pub fn show(&mut self, content: PanelContent) {
        self.content = Some(content);
        self.revision += 1;
    }

    pub fn content(&self) -> Option<&PanelContent> {
        self.content.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// State for tracking file dialog operations
#[derive(Resource, Default)]
struct FileDialogState {
    pending_task: Option<std::thread::JoinHandle<Option<PathBuf>>>,
}

fn color32(color: Rgb) -> egui::Color32 {
    let [r, g, b] = color.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    egui::Color32::from_rgb(r, g, b)
}

/// Black or white, whichever reads better on `background`
fn text_on(background: Rgb) -> egui::Color32 {
    let luma = 0.299 * background.r + 0.587 * background.g + 0.114 * background.b;
    if luma > 0.5 {
        egui::Color32::BLACK
    } else {
        egui::Color32::WHITE
    }
}

fn format_time(secs: f32) -> String {
    let secs = secs.max(0.0) as u32;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Menu bar system
fn menu_bar_system(
    mut contexts: EguiContexts,
    mut file_dialog: ResMut<FileDialogState>,
    mut app_exit: MessageWriter<AppExit>,
    mut playback: MessageWriter<PlaybackCommand>,
    loading: Res<LoadingState>,
    registry: Res<SceneRegistry>,
) -> Result {
    // The galaxy is built once per session
    let can_open = registry.is_empty()
        && !matches!(*loading, LoadingState::Loading)
        && file_dialog.pending_task.is_none();

    egui::TopBottomPanel::top("menu_bar").show(contexts.ctx_mut()?, |ui| {
        ui.horizontal(|ui| {
            ui.menu_button("File", |ui| {
                if ui
                    .add_enabled(can_open, egui::Button::new("Open library..."))
                    .clicked()
                {
                    // Spawn file dialog in background thread
                    let task = std::thread::spawn(|| {
                        FileDialog::new()
                            .add_filter("Saved tracks JSON", &["json"])
                            .set_title("Open Spotify Library")
                            .pick_file()
                    });
                    file_dialog.pending_task = Some(task);
                    ui.close();
                }

                ui.separator();

                if ui.button("Exit").clicked() {
                    app_exit.write(AppExit::Success);
                }
            });

            ui.menu_button("Playback", |ui| {
                if ui.button("Play/Pause").clicked() {
                    playback.write(PlaybackCommand::PressPlayPause);
                    ui.close();
                }
            });
        });
    });

    Ok(())
}

/// Right-hand panel describing the selected planet
fn info_panel_system(
    mut contexts: EguiContexts,
    panel: Res<InfoPanel>,
    mut select: MessageWriter<SelectPlanet>,
) -> Result {
    egui::SidePanel::right("info_panel")
        .default_width(240.0)
        .show(contexts.ctx_mut()?, |ui| {
            let Some(content) = panel.content() else {
                ui.label("Click a planet to play its preview.");
                return;
            };

            ui.heading(&content.title);
            ui.label(&content.artist);
            ui.label(
                egui::RichText::new(&content.genre)
                    .color(color32(content.color))
                    .strong(),
            );

            ui.separator();
            ui.label(egui::RichText::new("Connected Songs").strong());

            egui::ScrollArea::vertical().show(ui, |ui| {
                for song in &content.connected {
                    let text = egui::RichText::new(format!("{} ({})", song.name, song.genre))
                        .color(text_on(song.color));
                    let button = egui::Button::new(text).fill(color32(song.color));
                    if ui
                        .add_sized([ui.available_width(), 24.0], button)
                        .on_hover_text(&song.artist)
                        .clicked()
                    {
                        info!("Selecting {} from the info panel", song.name);
                        select.write(SelectPlanet(song.id));
                    }
                }
            });
        });

    Ok(())
}

/// Bottom bar: play/pause, now playing, waveform
fn player_bar_system(
    mut contexts: EguiContexts,
    state: Res<PlaybackState>,
    waveform: Res<WaveformData>,
    mut playback: MessageWriter<PlaybackCommand>,
) -> Result {
    egui::TopBottomPanel::bottom("player_bar").show(contexts.ctx_mut()?, |ui| {
        ui.horizontal(|ui| {
            if ui.button(state.button_label).clicked() {
                playback.write(PlaybackCommand::PressPlayPause);
            }

            let status = match state.status {
                PlaybackStatus::Loading => "Loading...".to_string(),
                _ if state.loaded_url.is_none() => String::new(),
                _ => format!(
                    "{} / {}",
                    format_time(state.current_position),
                    format_time(state.total_duration)
                ),
            };
            ui.label(status);
            ui.label(egui::RichText::new(&state.now_playing).strong());
        });

        let size = egui::vec2(ui.available_width(), 48.0);
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, egui::CornerRadius::ZERO, egui::Color32::from_gray(20));

        let peaks = waveform.peaks();
        if !peaks.is_empty() {
            let played = played_bars(peaks.len(), state.progress());
            let bar_width = rect.width() / peaks.len() as f32;
            for (i, peak) in peaks.iter().enumerate() {
                let height = (peak * rect.height()).max(1.0);
                let x = rect.left() + i as f32 * bar_width;
                let bar = egui::Rect::from_min_max(
                    egui::pos2(x, rect.center().y - height / 2.0),
                    egui::pos2(x + (bar_width - 1.0).max(1.0), rect.center().y + height / 2.0),
                );
                let color = if i < played {
                    egui::Color32::YELLOW
                } else {
                    egui::Color32::WHITE
                };
                painter.rect_filled(bar, egui::CornerRadius::ZERO, color);
            }
        }

        if response.clicked()
            && waveform.is_loaded()
            && let Some(pos) = response.interact_pointer_pos()
        {
            playback.write(PlaybackCommand::Seek(seek_fraction(
                pos.x,
                rect.left(),
                rect.width(),
            )));
        }
    });

    Ok(())
}

/// Centered message until the planets are in
fn loading_overlay_system(mut contexts: EguiContexts, loading: Res<LoadingState>) -> Result {
    let text = match *loading {
        LoadingState::Ready { .. } => return Ok(()),
        LoadingState::Waiting => "Open a library to begin (File > Open library...)",
        LoadingState::Loading | LoadingState::Failed(_) => "Loading your galaxy...",
    };

    egui::Area::new(egui::Id::new("loading_overlay"))
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .interactable(false)
        .show(contexts.ctx_mut()?, |ui| {
            ui.label(
                egui::RichText::new(text)
                    .size(28.0)
                    .color(egui::Color32::WHITE),
            );
        });

    Ok(())
}

/// Track names drawn at each label's projected position
fn planet_labels_system(
    mut contexts: EguiContexts,
    cameras: Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    labels: Query<(&PlanetLabel, &GlobalTransform)>,
) -> Result {
    let Ok((camera, camera_transform)) = cameras.single() else {
        return Ok(());
    };
    let ctx = contexts.ctx_mut()?;
    let painter = ctx.layer_painter(egui::LayerId::background());
    let camera_up = *camera_transform.up();

    for (label, transform) in &labels {
        let center = transform.translation();
        let scale = transform.to_scale_rotation_translation().0.y;
        let top = center + camera_up * LABEL_SIZE.y * 0.5 * scale;

        let (Ok(screen), Ok(screen_top)) = (
            camera.world_to_viewport(camera_transform, center),
            camera.world_to_viewport(camera_transform, top),
        ) else {
            continue;
        };

        // Size the text to the label's world footprint
        let font_size = (screen.distance(screen_top) * 1.2).clamp(6.0, 32.0);
        painter.text(
            egui::pos2(screen.x, screen.y),
            egui::Align2::CENTER_CENTER,
            &label.text,
            egui::FontId::proportional(font_size),
            egui::Color32::WHITE,
        );
    }

    Ok(())
}

/// Remember whether egui wants the pointer this frame
fn track_pointer_system(mut contexts: EguiContexts, mut pointer: ResMut<PointerOverUi>) -> Result {
    let ctx = contexts.ctx_mut()?;
    pointer.0 = ctx.is_pointer_over_area() || ctx.wants_pointer_input();
    Ok(())
}

/// System to poll file dialog results
fn file_dialog_poll_system(
    mut file_dialog: ResMut<FileDialogState>,
    mut load: MessageWriter<LoadLibrary>,
) {
    if let Some(task) = file_dialog.pending_task.take() {
        if task.is_finished() {
            if let Ok(Some(path)) = task.join() {
                info!("Library selected: {}", path.display());
                load.write(LoadLibrary(LibrarySource::File(path)));
            }
        } else {
            // Put it back if not finished
            file_dialog.pending_task = Some(task);
        }
    }
}
