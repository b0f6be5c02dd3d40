//! Note Dash entry point
//!
//! Handles platform-specific initialization and drives the frame loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use thiserror::Error;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent};

    use note_dash::Camera;
    use note_dash::assets::{
        self, AssetState, ModelDesc, ModelStyle, Models, TextureImage, Textures, paths,
    };
    use note_dash::audio::{self, AudioManager, SoundCue};
    use note_dash::platform::{Command, command_for_key};
    use note_dash::renderer::{RenderError, SceneRenderer, TextureSlot, collect_scene};
    use note_dash::settings::Settings;
    use note_dash::sim::{Action, FrameInput, GameState, LoopControl, apply_action, frame};
    use note_dash::ui::{self, ids};

    #[derive(Debug, Error)]
    enum StartupError {
        #[error("missing DOM element: {0}")]
        Dom(&'static str),
        #[error("failed to create surface: {0}")]
        Surface(#[from] wgpu::CreateSurfaceError),
        #[error("no suitable GPU adapter: {0}")]
        Adapter(#[from] wgpu::RequestAdapterError),
        #[error(transparent)]
        Render(#[from] RenderError),
    }

    /// Game instance holding all state
    struct Game {
        state: GameState,
        models: Models,
        textures: Textures,
        camera: Camera,
        renderer: Option<SceneRenderer>,
        audio: AudioManager,
        settings: Settings,
        /// An animation frame is scheduled
        loop_running: bool,
        /// Last pointer position while the primary button is held
        drag: Option<(i32, i32)>,
    }

    impl Game {
        fn new(seed: u64, settings: Settings, aspect: f32) -> Self {
            Self {
                state: GameState::with_tuning(seed, settings.tuning.clone()),
                models: Models::default(),
                textures: Textures::default(),
                camera: Camera::new(aspect),
                renderer: None,
                audio: AudioManager::new(),
                settings,
                loop_running: false,
                drag: None,
            }
        }

        /// Run one frame of the session and react to what happened in it
        fn tick(&mut self, time: f64) -> LoopControl {
            let input = FrameInput {
                camera_z: self.camera.position.z,
                player_model_ready: self.models.player.is_ready(),
            };

            let Game {
                state,
                models,
                camera,
                renderer,
                ..
            } = self;
            let control = frame(state, &input, |state| {
                if let Some(renderer) = renderer.as_mut() {
                    let scene = collect_scene(state, models);
                    match renderer.render(&scene, camera, time) {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            renderer.resize(renderer.size.0, renderer.size.1);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("Out of memory!");
                        }
                        Err(e) => log::warn!("Render error: {:?}", e),
                    }
                }
            });

            self.handle_events();
            ui::dom::set_points_text(&ui::hud_text(&self.state));
            control
        }

        fn handle_events(&mut self) {
            for event in self.state.drain_events() {
                if let Some(cue) = SoundCue::for_event(event) {
                    self.audio.play(cue, &self.settings);
                }
            }
        }

        fn toggle_mute(&mut self) {
            self.settings.muted = !self.settings.muted;
            self.settings.save();
            self.audio.apply_settings(&self.settings);
            log::info!("Muted: {}", self.settings.muted);
        }

        /// Push a loaded texture to the GPU; a no-op until both exist
        fn upload_texture(&mut self, slot: TextureSlot) {
            let image = match slot {
                TextureSlot::Ground => self.textures.ground.ready(),
                TextureSlot::Background => self.textures.background.ready(),
            };
            if let (Some(renderer), Some(image)) = (self.renderer.as_mut(), image) {
                renderer.set_texture(slot, image);
            }
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.camera.resize(width, height);
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.resize(width, height);
            }
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();

        let settings = Settings::load();
        if console_log::init_with_level(settings.level()).is_err() {
            web_sys::console::warn_1(&"Logger already initialised".into());
        }

        log::info!("Note Dash starting...");

        if let Err(err) = start(settings).await {
            log::error!("Startup failed: {}", err);
        }
    }

    async fn start(settings: Settings) -> Result<(), StartupError> {
        let window = web_sys::window().ok_or(StartupError::Dom("window"))?;
        let document = window.document().ok_or(StartupError::Dom("document"))?;

        let canvas: HtmlCanvasElement = document
            .get_element_by_id(ids::CANVAS)
            .and_then(|el| el.dyn_into().ok())
            .ok_or(StartupError::Dom(ids::CANVAS))?;
        let (width, height) = canvas_size(&window, &canvas);

        let seed = settings.seed.unwrap_or_else(|| js_sys::Date::now() as u64);
        let aspect = width as f32 / height.max(1) as f32;
        let game = Rc::new(RefCell::new(Game::new(seed, settings, aspect)));
        log::info!("Game initialized with seed: {}", seed);

        load_assets(game.clone());

        match init_renderer(&canvas, width, height).await {
            Ok(renderer) => {
                let mut g = game.borrow_mut();
                g.renderer = Some(renderer);
                // Textures that finished before the device existed
                g.upload_texture(TextureSlot::Ground);
                g.upload_texture(TextureSlot::Background);
            }
            Err(err) => log::error!("Rendering disabled: {}", err),
        }

        setup_start_button(game.clone());
        setup_keyboard(game.clone());
        setup_resize(&canvas, game.clone());
        setup_orbit_controls(&canvas, game);

        log::info!("Note Dash ready");
        Ok(())
    }

    async fn init_renderer(
        canvas: &HtmlCanvasElement,
        width: u32,
        height: u32,
    ) -> Result<SceneRenderer, StartupError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        Ok(SceneRenderer::new(surface, &adapter, width, height).await?)
    }

    fn canvas_size(window: &web_sys::Window, canvas: &HtmlCanvasElement) -> (u32, u32) {
        let dpr = window.device_pixel_ratio();
        let width = ((canvas.client_width() as f64 * dpr) as u32).max(1);
        let height = ((canvas.client_height() as f64 * dpr) as u32).max(1);
        canvas.set_width(width);
        canvas.set_height(height);
        (width, height)
    }

    /// Fire off every asset load; each one lands in its slot when done
    fn load_assets(game: Rc<RefCell<Game>>) {
        type Slot = fn(&mut Models) -> &mut AssetState<ModelDesc>;
        let model_slots: [(&'static str, ModelStyle, Slot); 3] = [
            (paths::PLAYER_MODEL, ModelStyle::PIANO, |m| &mut m.player),
            (paths::NOTE_MODEL, ModelStyle::BONUS_NOTE, |m| &mut m.bonus),
            (paths::NOTE_MODEL, ModelStyle::PENALTY_NOTE, |m| &mut m.penalty),
        ];
        for (url, style, slot) in model_slots {
            let game = game.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = assets::web::load_model(url, &style).await;
                let mut g = game.borrow_mut();
                *slot(&mut g.models) = AssetState::from_result(style.name, result);
            });
        }

        type TextureSlotRef = fn(&mut Textures) -> &mut AssetState<TextureImage>;
        let texture_slots: [(&'static str, TextureSlot, TextureSlotRef); 2] = [
            (paths::GROUND_TEXTURE, TextureSlot::Ground, |t| &mut t.ground),
            (paths::BACKGROUND_TEXTURE, TextureSlot::Background, |t| &mut t.background),
        ];
        for (url, slot, state) in texture_slots {
            let game = game.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = assets::web::load_texture(url).await;
                let mut g = game.borrow_mut();
                *state(&mut g.textures) = AssetState::from_result(url, result);
                g.upload_texture(slot);
            });
        }

        let ctx = game.borrow().audio.context();
        for cue in SoundCue::ALL {
            let game = game.clone();
            let ctx = ctx.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = audio::load_clip(ctx, cue).await;
                let mut g = game.borrow_mut();
                let g = &mut *g;
                g.audio.set_clip(cue, result, &g.settings);
            });
        }
    }

    fn ensure_loop(game: &Rc<RefCell<Game>>) {
        let start = {
            let mut g = game.borrow_mut();
            !std::mem::replace(&mut g.loop_running, true)
        };
        if start {
            request_animation_frame(game.clone());
        }
    }

    /// Schedule the next frame; on failure the loop is marked stopped so a
    /// later start or restart can schedule it again
    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            log::error!("No window, frame loop stopped");
            game.borrow_mut().loop_running = false;
            return;
        };
        let next = game.clone();
        let closure = Closure::once(move |time: f64| {
            game_loop(next, time);
        });
        match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            Ok(_) => closure.forget(),
            Err(err) => {
                log::error!("requestAnimationFrame failed: {:?}", err);
                game.borrow_mut().loop_running = false;
            }
        }
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        let control = game.borrow_mut().tick(time);
        match control {
            LoopControl::Continue => request_animation_frame(game),
            LoopControl::Stop => {
                game.borrow_mut().loop_running = false;
                log::info!("Frame loop stopped");
            }
        }
    }

    fn setup_start_button(game: Rc<RefCell<Game>>) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let Some(btn) = document.get_element_by_id(ids::START_BUTTON) else {
            log::warn!("No start button found");
            return;
        };

        let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
            {
                let mut g = game.borrow_mut();
                g.state.start();
                g.audio.resume();
            }
            ui::dom::show_game_ui();
            ensure_loop(&game);
        });
        let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_keyboard(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };

        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            let Some(command) = command_for_key(&event.key()) else {
                return;
            };
            match command {
                Command::Game(action) => {
                    apply_action(&mut game.borrow_mut().state, action);
                    if action == Action::Restart {
                        ensure_loop(&game);
                    }
                }
                Command::ToggleMute => game.borrow_mut().toggle_mute(),
            }
        });
        let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_resize(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let canvas = canvas.clone();
        let win = window.clone();

        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let (width, height) = canvas_size(&win, &canvas);
            game.borrow_mut().resize(width, height);
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_orbit_controls(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        // Mouse down
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                if event.button() == 0 {
                    game.borrow_mut().drag = Some((event.client_x(), event.client_y()));
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse move
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut g = game.borrow_mut();
                let Some((last_x, last_y)) = g.drag else {
                    return;
                };
                let (x, y) = (event.client_x(), event.client_y());
                g.drag = Some((x, y));
                if g.settings.orbit_controls {
                    g.camera.orbit((x - last_x) as f32, (y - last_y) as f32);
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse up
        if let Some(window) = web_sys::window() {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().drag = None;
            });
            let _ = window
                .add_event_listener_with_callback("mouseup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Wheel
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: WheelEvent| {
                let mut g = game.borrow_mut();
                if g.settings.orbit_controls {
                    event.prevent_default();
                    g.camera.zoom(event.delta_y() as f32);
                }
            });
            let _ = canvas.add_event_listener_with_callback("wheel", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use note_dash::Settings;
    use note_dash::sim::{FrameInput, GameState, LoopControl, frame};

    env_logger::init();
    log::info!("Note Dash (native) starting...");
    log::info!("Rendering requires a browser - run with `trunk serve` for the web version");

    // Headless session: the notes drift past an idle player until the frame cap
    const MAX_FRAMES: u64 = 60 * 60;
    let settings = Settings::load();
    let seed = settings.seed.unwrap_or(0);

    let mut state = GameState::with_tuning(seed, settings.tuning.clone());
    state.start();
    let input = FrameInput::default();
    while state.frame_count < MAX_FRAMES {
        if frame(&mut state, &input, |_| {}) == LoopControl::Stop {
            break;
        }
        for event in state.drain_events() {
            log::debug!("Frame {}: {:?}", state.frame_count, event);
        }
    }

    log::info!(
        "Headless session finished: seed {}, {} frames, score {}, phase {:?}",
        seed,
        state.frame_count,
        state.score(),
        state.phase()
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
