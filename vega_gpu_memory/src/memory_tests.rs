use super::*;
use crate::mock_device::MockMemoryDevice;
use crate::sync::NoopSync;

fn noop_service() -> (Arc<MockMemoryDevice>, GpuMemory) {
    let device = Arc::new(MockMemoryDevice::new());
    let service = GpuMemory::new(
        device.clone(),
        Arc::new(NoopSync),
        MemoryConfig { chunk_size: 4096, frames_in_flight: 2 },
    );
    (device, service)
}

#[test]
fn test_default_config() {
    let config = MemoryConfig::default();
    assert_eq!(config.chunk_size, 16 * 1024 * 1024);
    assert_eq!(config.frames_in_flight, 2);
}

#[test]
fn test_one_allocator_per_kind() {
    let (_, service) = noop_service();
    for kind in MemoryKind::ALL {
        assert_eq!(service.allocator(kind).kind(), kind);
    }
}

#[test]
fn test_create_buffer_routes_to_kind_allocator() {
    let (_, service) = noop_service();

    let _vertices = service
        .create_buffer(MemoryKind::Vertex, 256, UpdateFrequency::Often)
        .unwrap();
    let _indices = service
        .create_buffer(MemoryKind::Index, 256, UpdateFrequency::Once)
        .unwrap();

    assert_eq!(service.allocator(MemoryKind::Vertex).chunk_count(), 1);
    assert_eq!(service.allocator(MemoryKind::Index).standalone_count(), 1);
    assert_eq!(service.allocator(MemoryKind::Uniform).chunk_count(), 0);
}

#[test]
fn test_sync_object_stamped_with_current_frame() {
    let device = Arc::new(MockMemoryDevice::new());
    let service = GpuMemory::with_api(
        device,
        RenderApi::Vulkan,
        MemoryConfig { chunk_size: 4096, frames_in_flight: 2 },
    )
    .unwrap();

    service.end_frame();
    service.end_frame();
    service.end_frame();
    assert_eq!(service.frame_number(), 3);

    let handle = service.create_sync_object(SyncFlags::empty());
    // Two more frames must pass before the object resolves
    assert_eq!(service.lock_pool().pending_count(), 1);
    service.end_frame();
    assert_eq!(service.lock_pool().pending_count(), 1);
    service.end_frame();
    assert_eq!(service.wait_sync_object(handle), WaitOutcome::Resolved);
}

#[test]
fn test_end_frame_sweeps_resolved_slots() {
    let device = Arc::new(MockMemoryDevice::new());
    let service = GpuMemory::with_api(
        device,
        RenderApi::Vulkan,
        MemoryConfig { chunk_size: 4096, frames_in_flight: 1 },
    )
    .unwrap();

    let _handle = service.create_sync_object(SyncFlags::empty());
    assert_eq!(service.lock_pool().pending_count(), 1);

    service.end_frame();
    // Frame advanced past the in-flight window; the sweep reset the slot
    assert_eq!(service.lock_pool().pending_count(), 0);
    assert_eq!(service.lock_pool().len(), 1);
}

#[test]
fn test_with_api_rejects_opengl() {
    let device = Arc::new(MockMemoryDevice::new());
    let result = GpuMemory::with_api(device, RenderApi::OpenGl, MemoryConfig::default());
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_full_frame_cycle_round_trip() {
    let device = Arc::new(MockMemoryDevice::new());
    let service = GpuMemory::with_api(
        device,
        RenderApi::None,
        MemoryConfig { chunk_size: 4096, frames_in_flight: 2 },
    )
    .unwrap();

    let buffer = service
        .create_buffer(MemoryKind::Uniform, 128, UpdateFrequency::Often)
        .unwrap();
    let lock = buffer.write_or_clear_bytes(0, 128, Some(&[7u8; 128])).unwrap();
    buffer.submit_lock(&lock, service.create_sync_object(SyncFlags::empty()));
    service.end_frame();

    let mut out = vec![0u8; 128];
    buffer.read_bytes(0, &mut out).unwrap();
    assert_eq!(out, vec![7u8; 128]);
}

#[test]
#[should_panic(expected = "chunk_size")]
fn test_zero_chunk_size_is_fatal() {
    let device = Arc::new(MockMemoryDevice::new());
    let _ = GpuMemory::new(
        device,
        Arc::new(NoopSync),
        MemoryConfig { chunk_size: 0, frames_in_flight: 2 },
    );
}
