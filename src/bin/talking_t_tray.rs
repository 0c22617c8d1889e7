//! talking-t-tray: menu-bar front end.
//!
//! Tray icon with Speak now / Schedule / Quit, and a borderless 200×200
//! avatar window in the upper-right corner that is visible only while a
//! phrase is spoken. The window stays mapped the whole time and is parked
//! off-screen while idle. The talker itself runs on a tokio runtime beside
//! the eframe event loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::Parser;
use eframe::egui;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem, Submenu};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use talking_t::avatar::{
    window_placement, AvatarDisplay, AvatarImages, Frame, WindowPlacement, PARKED_POSITION,
};
use talking_t::config::Config;
use talking_t::menu::{menu_layout, MenuAction, MenuEntry, APP_TITLE};
use talking_t::schedule::ScheduleMode;
use talking_t::talker::TalkerCommand;

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(0xe8, 0xe8, 0xe8);
const TRAY_ICON_SIZE: u32 = 32;

#[derive(Parser, Debug)]
#[command(name = "talking-t-tray", about = "Menu-bar talker")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Starting schedule (overrides config)
    #[arg(short, long, value_enum)]
    mode: Option<ScheduleMode>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

// --- Avatar window state shared with the talker ---

#[derive(Debug, Clone, Copy)]
struct AvatarView {
    visible: bool,
    frame: Frame,
}

/// Only touches shared state; the window itself is moved from `update`.
struct EguiAvatar {
    ctx: egui::Context,
    view: Arc<Mutex<AvatarView>>,
}

impl EguiAvatar {
    fn update(&self, f: impl FnOnce(&mut AvatarView)) {
        if let Ok(mut view) = self.view.lock() {
            f(&mut view);
        }
        self.ctx.request_repaint();
    }
}

impl AvatarDisplay for EguiAvatar {
    fn show(&self) {
        self.update(|v| {
            v.visible = true;
            v.frame = Frame::Closed;
        });
    }

    fn set_frame(&self, frame: Frame) {
        self.update(|v| v.frame = frame);
    }

    fn hide(&self) {
        self.update(|v| {
            v.visible = false;
            v.frame = Frame::Closed;
        });
    }
}

// --- Tray menu ---

struct TrayMenu {
    _tray: TrayIcon,
    checks: Vec<(ScheduleMode, CheckMenuItem)>,
}

impl TrayMenu {
    fn build(icon: Icon, active: ScheduleMode) -> Result<Self, tray_icon::Error> {
        let menu = Menu::new();
        let mut checks = Vec::new();

        for entry in menu_layout(active) {
            match entry {
                MenuEntry::Item(action) => {
                    menu.append(&MenuItem::with_id(action.id(), action.label(), true, None))?;
                }
                MenuEntry::Separator => menu.append(&PredefinedMenuItem::separator())?,
                MenuEntry::Submenu { label, items } => {
                    let submenu = Submenu::new(label, true);
                    for (action, checked) in items {
                        let item =
                            CheckMenuItem::with_id(action.id(), action.label(), true, checked, None);
                        submenu.append(&item)?;
                        if let MenuAction::Schedule(mode) = action {
                            checks.push((mode, item));
                        }
                    }
                    menu.append(&submenu)?;
                }
            }
        }

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip(APP_TITLE)
            .with_icon(icon)
            .build()?;

        Ok(Self {
            _tray: tray,
            checks,
        })
    }

    /// Radio behavior: exactly the active mode is checked.
    fn sync(&self, active: ScheduleMode) {
        for (mode, item) in &self.checks {
            item.set_checked(*mode == active);
        }
    }
}

fn load_tray_icon(path: &Path) -> Result<Icon, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to load {}: {e}", path.display()))?
        .resize(
            TRAY_ICON_SIZE,
            TRAY_ICON_SIZE,
            image::imageops::FilterType::Triangle,
        )
        .to_rgba8();
    let (width, height) = img.dimensions();
    Icon::from_rgba(img.into_raw(), width, height).map_err(|e| format!("Bad tray icon: {e}"))
}

/// Menu clicks go straight to the talker.
fn route_menu_events(tx: mpsc::UnboundedSender<TalkerCommand>, ctx: egui::Context) {
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        let Some(action) = MenuAction::from_id(event.id.as_ref()) else {
            warn!("Unknown menu item: {:?}", event.id);
            return;
        };
        if tx.send(action.command()).is_err() {
            warn!("Talker is gone, dropping {action:?}");
        }
        ctx.request_repaint();
    }));
}

#[cfg(target_os = "linux")]
fn spawn_tray(icon: Icon, mut mode_rx: watch::Receiver<ScheduleMode>) -> Option<TrayMenu> {
    // libappindicator needs a running GTK main loop on its own thread
    std::thread::spawn(move || {
        if let Err(e) = gtk::init() {
            warn!("GTK init failed, no tray icon: {e}");
            return;
        }
        let active = *mode_rx.borrow_and_update();
        let tray = match TrayMenu::build(icon, active) {
            Ok(tray) => tray,
            Err(e) => {
                warn!("Failed to build tray icon: {e}");
                return;
            }
        };
        gtk::glib::timeout_add_local(std::time::Duration::from_millis(250), move || {
            if mode_rx.has_changed().unwrap_or(false) {
                tray.sync(*mode_rx.borrow_and_update());
            }
            gtk::glib::ControlFlow::Continue
        });
        gtk::main();
    });
    None
}

#[cfg(not(target_os = "linux"))]
fn spawn_tray(icon: Icon, mode_rx: watch::Receiver<ScheduleMode>) -> Option<TrayMenu> {
    match TrayMenu::build(icon, *mode_rx.borrow()) {
        Ok(tray) => Some(tray),
        Err(e) => {
            warn!("Failed to build tray icon: {e}");
            None
        }
    }
}

// --- eframe app ---

/// One texture per image file, looked up through the frame's path.
struct Textures {
    images: AvatarImages,
    by_path: HashMap<PathBuf, egui::TextureHandle>,
}

impl Textures {
    fn load(ctx: &egui::Context, images: &AvatarImages, size: u32) -> Result<Self, String> {
        let mut by_path = HashMap::new();
        let paths = std::iter::once(&images.closed)
            .chain(&images.talking)
            .chain(images.end.as_ref());
        for path in paths {
            by_path.insert(path.clone(), load_texture(ctx, path, size)?);
        }

        Ok(Self {
            images: images.clone(),
            by_path,
        })
    }

    fn get(&self, frame: Frame) -> Option<&egui::TextureHandle> {
        self.by_path.get(self.images.path(frame))
    }
}

fn load_texture(ctx: &egui::Context, path: &Path, size: u32) -> Result<egui::TextureHandle, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to load {}: {e}", path.display()))?
        .resize(size, size, image::imageops::FilterType::Triangle)
        .to_rgba8();
    let (width, height) = img.dimensions();
    let color = egui::ColorImage::from_rgba_unmultiplied(
        [width as usize, height as usize],
        img.as_raw(),
    );
    Ok(ctx.load_texture(
        path.display().to_string(),
        color,
        egui::TextureOptions::LINEAR,
    ))
}

struct TrayApp {
    view: Arc<Mutex<AvatarView>>,
    textures: Textures,
    size: f32,
    margin: f32,
    /// Last placement sent to the window. `None` until the first frame.
    placement: Option<WindowPlacement>,
    tray: Option<TrayMenu>,
    mode_rx: watch::Receiver<ScheduleMode>,
}

impl TrayApp {
    /// Moves the window whenever the wanted placement changes. Checked every
    /// frame, so a show or hide from the talker lands on the next repaint.
    fn place_window(&mut self, ctx: &egui::Context, visible: bool) {
        let screen_width = ctx.input(|i| i.viewport().monitor_size).map(|m| m.x);
        let wanted = window_placement(visible, screen_width, self.size, self.margin);
        if self.placement == Some(wanted) {
            return;
        }

        let (x, y) = wanted.position;
        ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(
            wanted.size,
            wanted.size,
        )));
        ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(egui::pos2(x, y)));
        ctx.send_viewport_cmd(egui::ViewportCommand::MousePassthrough(wanted.passthrough));
        if visible {
            ctx.send_viewport_cmd(egui::ViewportCommand::WindowLevel(
                egui::WindowLevel::AlwaysOnTop,
            ));
        }
        self.placement = Some(wanted);
    }
}

impl eframe::App for TrayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(tray) = &self.tray {
            if self.mode_rx.has_changed().unwrap_or(false) {
                tray.sync(*self.mode_rx.borrow_and_update());
            }
        }

        let view = match self.view.lock() {
            Ok(view) => *view,
            Err(_) => return,
        };
        self.place_window(ctx, view.visible);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(BACKGROUND))
            .show(ctx, |ui| {
                if !view.visible {
                    return;
                }
                if let Some(texture) = self.textures.get(view.frame) {
                    ui.add(
                        egui::Image::new(texture)
                            .fit_to_exact_size(egui::vec2(self.size, self.size)),
                    );
                }
            });
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        egui::Rgba::from(BACKGROUND).to_array()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    talking_t::init_logging(args.verbose);

    info!("talking-t-tray starting");

    let config = Config::load(args.config.as_deref());
    let image_dir = config.avatar.resolve_image_dir();
    let images = AvatarImages::discover(&image_dir)?;
    info!("Avatar images from {}", image_dir.display());

    let runtime = tokio::runtime::Runtime::new()?;
    let handle = runtime.handle().clone();

    let size = config.avatar.size as f32;
    let margin = config.avatar.margin as f32;
    let (parked_x, parked_y) = PARKED_POSITION;
    // eframe shows the window after its first frame, so it starts parked.
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([1.0, 1.0])
            .with_position([parked_x, parked_y])
            .with_decorations(false)
            .with_resizable(false)
            .with_window_level(egui::WindowLevel::AlwaysOnTop)
            .with_mouse_passthrough(true)
            .with_taskbar(false),
        ..Default::default()
    };

    eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |cc| {
            let textures = Textures::load(&cc.egui_ctx, &images, config.avatar.size)?;

            let view = Arc::new(Mutex::new(AvatarView {
                visible: false,
                frame: Frame::Closed,
            }));
            let display = Arc::new(EguiAvatar {
                ctx: cc.egui_ctx.clone(),
                view: view.clone(),
            });

            let mut talker =
                talking_t::build_talker(&config, args.mode, Some(&images), display);
            let mode_rx = talker.subscribe_mode();

            let (tx, rx) = mpsc::unbounded_channel();
            route_menu_events(tx, cc.egui_ctx.clone());

            let icon_path = images.end.as_deref().unwrap_or(&images.closed);
            let tray = load_tray_icon(icon_path)
                .map_err(|e| warn!("{e}"))
                .ok()
                .and_then(|icon| spawn_tray(icon, mode_rx.clone()));

            handle.spawn(async move {
                talker.run(rx).await;
                info!("talking-t-tray stopped");
                std::process::exit(0);
            });

            Ok(Box::new(TrayApp {
                view,
                textures,
                size,
                margin,
                placement: None,
                tray,
                mode_rx,
            }))
        }),
    )?;

    drop(runtime);
    Ok(())
}
