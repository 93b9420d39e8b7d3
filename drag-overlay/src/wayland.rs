use anyhow::{Context, Result};
use memmap2::MmapMut;
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    data_device_manager::{
        data_device::{DataDevice, DataDeviceHandler},
        data_offer::{DataOfferHandler, DragOffer},
        data_source::{DataSourceHandler, DragSource},
        DataDeviceManagerState, WritePipe,
    },
    delegate_compositor, delegate_data_device, delegate_layer, delegate_output, delegate_pointer,
    delegate_registry, delegate_seat,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        wlr_layer::{LayerShell, LayerShellHandler, LayerSurface, LayerSurfaceConfigure},
        WaylandSurface,
    },
};
use std::fs::File;
use std::os::fd::AsFd;
use tracing::{debug, error, info, warn};
use wayland_client::{
    globals::GlobalList,
    protocol::{
        wl_buffer, wl_data_device::WlDataDevice, wl_data_device_manager::DndAction,
        wl_data_source::WlDataSource, wl_output, wl_pointer, wl_seat, wl_shm, wl_shm_pool,
        wl_surface,
    },
    Connection, Dispatch, QueueHandle,
};

use crate::config::Config;
use crate::drag::{DragSourceController, FileDragListener, PendingDrag};
use crate::lifecycle::{KeepAlive, ProvidesKeepAlive, ShutdownTrigger};
use crate::overlay::OverlaySpec;
use crate::payload::ContentProvider;
use crate::renderer::{copy_to_argb8888, scaled_size, LabelRenderer};
use crate::style::{StyleRule, DEFAULT_RULE};
use crate::text_renderer::TextRenderer;

/// linux/input-event-codes.h
const BTN_LEFT: u32 = 0x110;

struct ShmBuffer {
    _file: File,
    mmap: MmapMut,
    pool: wl_shm_pool::WlShmPool,
    buffer: wl_buffer::WlBuffer,
    width: u32,
    height: u32,
}

impl ShmBuffer {
    fn new(shm: &wl_shm::WlShm, qh: &QueueHandle<AppState>, width: u32, height: u32) -> Result<Self> {
        let stride = width * 4;
        let size = stride * height;

        let file = tempfile::tempfile().context("Failed to create shm file")?;
        file.set_len(size as u64)?;

        let pool = shm.create_pool(file.as_fd(), size as i32, qh, ());
        let buffer = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride as i32,
            wl_shm::Format::Argb8888,
            qh,
            (),
        );

        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            _file: file,
            mmap,
            pool,
            buffer,
            width,
            height,
        })
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
        self.pool.destroy();
    }
}

struct OverlaySurface {
    layer: LayerSurface,
    buffer: Option<ShmBuffer>,
}

struct ActiveDrag {
    source: DragSource,
    provider: ContentProvider,
}

pub struct AppState {
    registry_state: RegistryState,
    output_state: OutputState,
    seat_state: SeatState,
    compositor_state: CompositorState,
    layer_shell: LayerShell,
    data_device_manager: DataDeviceManagerState,
    shm: wl_shm::WlShm,

    overlay: OverlaySpec,
    label_text: String,
    renderer: LabelRenderer,

    surface: Option<OverlaySurface>,
    pointer: Option<wl_pointer::WlPointer>,
    data_device: Option<DataDevice>,
    drag: DragSourceController<FileDragListener>,
    active_drag: Option<ActiveDrag>,

    /// Size from the last configure, in logical units.
    logical_size: Option<(u32, u32)>,
    scale: u32,

    keep_alive: KeepAlive,
    failure: Option<anyhow::Error>,
    configured: bool,
}

impl AppState {
    pub fn new(globals: &GlobalList, qh: &QueueHandle<Self>, config: &Config) -> Result<Self> {
        let compositor_state =
            CompositorState::bind(globals, qh).context("wl_compositor not available")?;
        let layer_shell = LayerShell::bind(globals, qh).context("layer_shell not available")?;
        let data_device_manager = DataDeviceManagerState::bind(globals, qh)
            .context("wl_data_device_manager not available")?;
        let shm = globals
            .bind::<wl_shm::WlShm, _, _>(qh, 1..=1, ())
            .context("wl_shm not found")?;

        let overlay = OverlaySpec::default();
        let style = StyleRule::parse(DEFAULT_RULE)?;
        if !style.applies_to(overlay.css_class) {
            anyhow::bail!("Style rule does not match window class '{}'", overlay.css_class);
        }
        let renderer = LabelRenderer::new(
            overlay.label.width,
            overlay.label.height,
            style.colors,
            TextRenderer::load_system(),
        )?;

        let source = config.source_path();
        if !source.exists() {
            warn!("Drag source {} does not exist", source.display());
        }

        Ok(Self {
            registry_state: RegistryState::new(globals),
            output_state: OutputState::new(globals, qh),
            seat_state: SeatState::new(globals, qh),
            compositor_state,
            layer_shell,
            data_device_manager,
            shm,
            overlay,
            label_text: config.label_text.clone(),
            renderer,
            surface: None,
            pointer: None,
            data_device: None,
            drag: DragSourceController::new(FileDragListener::new(source)),
            active_drag: None,
            logical_size: None,
            scale: 1,
            keep_alive: KeepAlive::default(),
            failure: None,
            configured: false,
        })
    }

    /// Creates the layer surface. Drawing waits for the first configure.
    pub fn present(&mut self, qh: &QueueHandle<Self>) {
        info!(
            "Presenting overlay: layer {:?}, anchor {:?}, margins {:?}, namespace '{}', decorated {}",
            self.overlay.layer,
            self.overlay.anchor,
            self.overlay.margin,
            self.overlay.namespace,
            self.overlay.decorated
        );
        let wl_surface = self.compositor_state.create_surface(qh);

        let layer = self.layer_shell.create_layer_surface(
            qh,
            wl_surface,
            self.overlay.layer,
            Some(self.overlay.namespace),
            None,
        );
        self.overlay.apply(&layer);
        layer.wl_surface().commit();

        self.surface = Some(OverlaySurface {
            layer,
            buffer: None,
        });
    }

    pub fn take_failure(&mut self) -> Option<anyhow::Error> {
        self.failure.take()
    }

    fn fail(&mut self, err: anyhow::Error) {
        error!("{:#}", err);
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self.keep_alive.shutdown(ShutdownTrigger::Failure);
    }

    fn draw(&mut self, qh: &QueueHandle<Self>) -> Result<()> {
        let (Some(surface), Some(logical)) = (self.surface.as_mut(), self.logical_size) else {
            return Ok(());
        };
        let (width, height) = scaled_size(logical, self.scale);

        self.renderer.resize(width, height)?;
        if surface.buffer.as_ref().map(ShmBuffer::size) != Some((width, height)) {
            surface.buffer = Some(ShmBuffer::new(&self.shm, qh, width, height)?);
        }
        let Some(buffer) = surface.buffer.as_mut() else {
            return Ok(());
        };

        let pixels = self.renderer.render(&self.label_text, self.scale as f32);
        copy_to_argb8888(pixels, &mut buffer.mmap[..]);
        buffer.mmap.flush()?;

        let wl_surface = surface.layer.wl_surface();
        wl_surface.set_buffer_scale(self.scale as i32);
        wl_surface.attach(Some(&buffer.buffer), 0, 0);
        wl_surface.damage_buffer(0, 0, width as i32, height as i32);
        wl_surface.commit();
        Ok(())
    }

    fn start_drag(&mut self, qh: &QueueHandle<Self>, pending: PendingDrag) {
        let (Some(device), Some(surface)) = (self.data_device.as_ref(), self.surface.as_ref()) else {
            warn!("No data device for this seat, cancelling drag");
            self.drag.abort();
            return;
        };

        let source = self.data_device_manager.create_drag_and_drop_source(
            qh,
            [pending.provider.mime_type()],
            self.drag.actions(),
        );
        source.start_drag(device, surface.layer.wl_surface(), None, pending.serial);

        self.active_drag = Some(ActiveDrag {
            source,
            provider: pending.provider,
        });
        self.drag.begin();
    }

    fn is_active_source(&self, source: &WlDataSource) -> bool {
        self.active_drag
            .as_ref()
            .is_some_and(|active| active.source.inner() == source)
    }

    fn finish_drag(&mut self, source: &WlDataSource, outcome: &str) {
        if self.is_active_source(source) {
            debug!("Drag {}", outcome);
            self.active_drag = None;
            self.drag.end();
        }
    }
}

impl ProvidesKeepAlive for AppState {
    fn keep_alive(&mut self) -> &mut KeepAlive {
        &mut self.keep_alive
    }
}

impl CompositorHandler for AppState {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        surface: &wl_surface::WlSurface,
        new_factor: i32,
    ) {
        let ours = self
            .surface
            .as_ref()
            .is_some_and(|s| s.layer.wl_surface() == surface);
        let scale = new_factor.max(1) as u32;
        if !ours || scale == self.scale {
            return;
        }

        debug!("Output scale changed to {}", scale);
        self.scale = scale;
        if let Err(e) = self.draw(qh) {
            self.fail(e.context("Failed to redraw overlay after scale change"));
        }
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }
}

impl OutputHandler for AppState {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }
}

impl LayerShellHandler for AppState {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        info!("Compositor closed the overlay surface");
        self.surface = None;
        self.keep_alive.shutdown(ShutdownTrigger::SurfaceClosed);
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let (w, h) = configure.new_size;
        let width = if w == 0 { self.overlay.label.width } else { w };
        let height = if h == 0 { self.overlay.label.height } else { h };
        self.logical_size = Some((width, height));

        if let Err(e) = self.draw(qh) {
            self.fail(e.context("Failed to draw overlay"));
            return;
        }

        if !self.configured {
            info!("Overlay surface configured ({}x{})", width, height);
            self.configured = true;
        }
    }
}

impl SeatHandler for AppState {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {}

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability != Capability::Pointer || self.pointer.is_some() {
            return;
        }

        match self.seat_state.get_pointer(qh, &seat) {
            Ok(pointer) => self.pointer = Some(pointer),
            Err(e) => warn!("Failed to get pointer: {}", e),
        }
        if self.data_device.is_none() {
            self.data_device = Some(self.data_device_manager.get_data_device(qh, &seat));
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Pointer {
            if let Some(pointer) = self.pointer.take() {
                pointer.release();
            }
        }
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {}
}

impl PointerHandler for AppState {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            let on_label = self
                .surface
                .as_ref()
                .is_some_and(|s| s.layer.wl_surface() == &event.surface);
            if !on_label {
                continue;
            }

            let (x, y) = event.position;
            match event.kind {
                PointerEventKind::Press {
                    button: BTN_LEFT,
                    serial,
                    ..
                } => self.drag.pointer_pressed(x, y, serial),
                PointerEventKind::Release {
                    button: BTN_LEFT, ..
                } => {
                    if self.drag.pointer_released() {
                        self.active_drag = None;
                    }
                }
                PointerEventKind::Leave { .. } => self.drag.pointer_left(),
                PointerEventKind::Motion { .. } => {
                    if let Some(pending) = self.drag.pointer_motion(x, y) {
                        self.start_drag(qh, pending);
                    }
                }
                _ => {}
            }
        }
    }
}

// This client is only ever a drag source; offers from other clients are ignored.
impl DataDeviceHandler for AppState {
    fn enter(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _data_device: &WlDataDevice) {}

    fn leave(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _data_device: &WlDataDevice) {}

    fn motion(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _data_device: &WlDataDevice) {}

    fn selection(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _data_device: &WlDataDevice,
    ) {
    }

    fn drop_performed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _data_device: &WlDataDevice,
    ) {
    }
}

impl DataOfferHandler for AppState {
    fn source_actions(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _offer: &mut DragOffer,
        _actions: DndAction,
    ) {
    }

    fn selected_action(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _offer: &mut DragOffer,
        _actions: DndAction,
    ) {
    }
}

impl DataSourceHandler for AppState {
    fn accept_mime(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _source: &WlDataSource,
        mime: Option<String>,
    ) {
        debug!("Drop target accepts {:?}", mime);
    }

    fn send_request(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        source: &WlDataSource,
        mime: String,
        fd: WritePipe,
    ) {
        let Some(active) = self
            .active_drag
            .as_ref()
            .filter(|active| active.source.inner() == source)
        else {
            debug!("Data request for a stale source, ignoring");
            return;
        };

        match active.provider.write_to(&mime, fd) {
            Ok(true) => debug!("Sent {} payload", mime),
            Ok(false) => debug!("Drop target asked for {}, which is not offered", mime),
            Err(e) => warn!("{:#}", e),
        }
    }

    fn cancelled(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, source: &WlDataSource) {
        self.finish_drag(source, "cancelled");
    }

    fn dnd_dropped(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _source: &WlDataSource) {
        debug!("Drop performed, waiting for target to finish");
    }

    fn dnd_finished(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, source: &WlDataSource) {
        self.finish_drag(source, "finished");
    }

    fn action(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _source: &WlDataSource,
        action: DndAction,
    ) {
        debug!("Compositor selected {:?}", action);
    }
}

delegate_compositor!(AppState);
delegate_output!(AppState);
delegate_layer!(AppState);
delegate_seat!(AppState);
delegate_pointer!(AppState);
delegate_data_device!(AppState);

delegate_registry!(AppState);

impl ProvidesRegistryState for AppState {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState, SeatState];
}

impl Dispatch<wl_shm::WlShm, ()> for AppState {
    fn event(
        _state: &mut Self,
        _proxy: &wl_shm::WlShm,
        _event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for AppState {
    fn event(
        _state: &mut Self,
        _proxy: &wl_shm_pool::WlShmPool,
        _event: wl_shm_pool::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_buffer::WlBuffer, ()> for AppState {
    fn event(
        _state: &mut Self,
        _proxy: &wl_buffer::WlBuffer,
        _event: wl_buffer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}
