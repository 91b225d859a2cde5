use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mediabuf::{
    BlockAllocator, Buffer, BufferData, BufferId, BufferInfo, BufferKind, ErrorKind, MemoryUsage,
    PixelFormat, PlaneIndex, Rect, SystemAllocator, downcast_info, fence,
};

fn block_allocator() -> BlockAllocator {
    BlockAllocator::new(Arc::new(SystemAllocator::new()))
}

fn rw() -> MemoryUsage {
    MemoryUsage::software_read_write()
}

#[test]
fn test_linear_block_roundtrip() {
    const CAPACITY: usize = 1024 * 1024;
    let allocator = block_allocator();
    let block = allocator.allocate_linear_block(CAPACITY, rw()).unwrap();

    let mut view = block.map().acquire().unwrap();
    assert_eq!(view.capacity(), CAPACITY);
    assert_eq!(view.offset(), 0);
    assert_eq!(view.size(), CAPACITY);
    for (i, b) in view.data_mut().iter_mut().enumerate() {
        *b = (i % 100) as u8;
    }
    drop(view);

    let shared = block
        .share(CAPACITY / 3, CAPACITY / 3, fence::ready())
        .unwrap();
    let read = shared.map().acquire().unwrap();
    assert_eq!(read.capacity(), CAPACITY / 3);
    for (i, &b) in read.data().iter().enumerate() {
        assert_eq!(b as usize, (i + CAPACITY / 3) % 100, "at i = {i}");
    }

    let sub = read.sub_view(333, 100).unwrap();
    assert_eq!(sub.size(), 100);
    for (i, &b) in sub.data().iter().enumerate() {
        assert_eq!(b as usize, (i + 333 + CAPACITY / 3) % 100, "at i = {i}");
    }
}

#[test]
fn test_graphic_block_quarter_rect_markers() {
    const WIDTH: u32 = 320;
    const HEIGHT: u32 = 240;
    let allocator = block_allocator();
    let block = allocator
        .allocate_graphic_block(WIDTH, HEIGHT, PixelFormat::Yuv420Planar, rw())
        .unwrap();

    let marker_rect = Rect::at(WIDTH / 4, HEIGHT / 4, WIDTH / 2, HEIGHT / 2);
    let markers = [
        (PlaneIndex::Y, 0x12u8),
        (PlaneIndex::U, 0x34),
        (PlaneIndex::V, 0x56),
    ];

    let mut view = block.map().acquire().unwrap();
    for (plane, value) in markers {
        let info = *view.layout().plane(plane);
        let data = view.plane_mut(plane);
        data.fill(0);
        for row in 0..marker_rect.height / info.vert_subsampling {
            for col in 0..marker_rect.width / info.horiz_subsampling {
                let offset = info.sample_offset(
                    marker_rect.left,
                    marker_rect.top,
                    col * info.horiz_subsampling,
                    row * info.vert_subsampling,
                );
                data[offset] = value;
            }
        }
    }
    drop(view);

    let shared = block
        .share(Rect::new(WIDTH, HEIGHT), fence::ready())
        .unwrap();
    drop(block);

    let view = shared.map().acquire().unwrap();
    assert_eq!(view.width(), WIDTH);
    assert_eq!(view.height(), HEIGHT);

    let verify = |plane: PlaneIndex, rect: Rect, value: u8| {
        let info = *view.layout().plane(plane);
        let data = view.plane(plane);
        for row in 0..rect.height / info.vert_subsampling {
            for col in 0..rect.width / info.horiz_subsampling {
                let offset = info.sample_offset(
                    rect.left,
                    rect.top,
                    col * info.horiz_subsampling,
                    row * info.vert_subsampling,
                );
                if data[offset] != value {
                    return false;
                }
            }
        }
        true
    };

    for (plane, value) in markers {
        assert!(verify(plane, marker_rect, value));
        assert!(verify(plane, Rect::new(WIDTH, HEIGHT / 4), 0));
        assert!(verify(plane, Rect::new(WIDTH / 4, HEIGHT), 0));
    }
}

#[test]
fn test_buffer_data_classification() {
    let allocator = block_allocator();
    let linear1 = allocator.allocate_linear_block(1024, rw()).unwrap();
    let linear2 = allocator.allocate_linear_block(2048, rw()).unwrap();
    let graphic1 = allocator
        .allocate_graphic_block(320, 240, PixelFormat::Yuv420Planar, rw())
        .unwrap();
    let graphic2 = allocator
        .allocate_graphic_block(176, 144, PixelFormat::Yuv420Planar, rw())
        .unwrap();

    let data = BufferData::from_linear_blocks(vec![
        linear1.share(0, 1024, fence::ready()).unwrap(),
    ]);
    assert_eq!(data.kind(), BufferKind::Linear);
    assert_eq!(data.linear_blocks().len(), 1);
    assert_eq!(data.linear_blocks()[0].handle(), linear1.handle());
    assert!(data.graphic_blocks().is_empty());

    let data = BufferData::from_linear_blocks(vec![
        linear1.share(0, 1024, fence::ready()).unwrap(),
        linear2.share(0, 2048, fence::ready()).unwrap(),
    ]);
    assert_eq!(data.kind(), BufferKind::LinearChunks);
    assert_eq!(data.linear_blocks().len(), 2);
    assert_eq!(data.linear_blocks()[0].handle(), linear1.handle());
    assert_eq!(data.linear_blocks()[1].handle(), linear2.handle());
    assert!(data.graphic_blocks().is_empty());

    let data = BufferData::from_graphic_blocks(vec![
        graphic1.share(Rect::new(320, 240), fence::ready()).unwrap(),
    ]);
    assert_eq!(data.kind(), BufferKind::Graphic);
    assert_eq!(data.graphic_blocks().len(), 1);
    assert_eq!(data.graphic_blocks()[0].handle(), graphic1.handle());
    assert!(data.linear_blocks().is_empty());

    let data = BufferData::from_graphic_blocks(vec![
        graphic1.share(Rect::new(320, 240), fence::ready()).unwrap(),
        graphic2.share(Rect::new(176, 144), fence::ready()).unwrap(),
    ]);
    assert_eq!(data.kind(), BufferKind::GraphicChunks);
    assert_eq!(data.graphic_blocks().len(), 2);
    assert_eq!(data.graphic_blocks()[0].handle(), graphic1.handle());
    assert_eq!(data.graphic_blocks()[1].handle(), graphic2.handle());
    assert!(data.linear_blocks().is_empty());
}

fn bump_counter(_id: BufferId, arg: usize) {
    let counter = unsafe { &*(arg as *const AtomicUsize) };
    counter.fetch_add(1, Ordering::SeqCst);
}

fn other_callback(_id: BufferId, _arg: usize) {}

fn make_buffer(allocator: &BlockAllocator) -> Buffer {
    let block = allocator.allocate_linear_block(1024, rw()).unwrap();
    Buffer::from_linear_blocks(vec![block.share(0, 1024, fence::ready()).unwrap()])
}

#[test]
fn test_destroy_notification_fires_once() {
    let allocator = block_allocator();
    let counter = AtomicUsize::new(0);
    let arg = &counter as *const AtomicUsize as usize;

    let buffer = make_buffer(&allocator);
    buffer.register_on_destroy_notify(bump_counter, arg).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let err = buffer
        .register_on_destroy_notify(bump_counter, arg)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Duplicate { .. }));

    drop(buffer);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_destroy_notification_unregister() {
    let allocator = block_allocator();
    let counter = AtomicUsize::new(0);
    let arg = &counter as *const AtomicUsize as usize;

    let buffer = make_buffer(&allocator);
    buffer.register_on_destroy_notify(bump_counter, arg).unwrap();

    let err = buffer
        .unregister_on_destroy_notify(bump_counter, 0)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));
    let err = buffer
        .unregister_on_destroy_notify(other_callback, arg)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));

    buffer.unregister_on_destroy_notify(bump_counter, arg).unwrap();
    let err = buffer
        .unregister_on_destroy_notify(bump_counter, arg)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));

    drop(buffer);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_destroy_notification_order_and_identity() {
    static ORDER: std::sync::Mutex<Vec<(BufferId, usize)>> = std::sync::Mutex::new(Vec::new());

    fn record(id: BufferId, arg: usize) {
        ORDER.lock().unwrap().push((id, arg));
    }

    let allocator = block_allocator();
    let buffer = make_buffer(&allocator);
    let id = buffer.id();
    buffer.register_on_destroy_notify(record, 1).unwrap();
    buffer.register_on_destroy_notify(record, 2).unwrap();
    buffer.register_on_destroy_notify(record, 3).unwrap();
    drop(buffer);

    let order = std::mem::take(&mut *ORDER.lock().unwrap());
    assert_eq!(order, vec![(id, 1), (id, 2), (id, 3)]);
}

#[test]
fn test_destroy_notification_fires_on_last_owner_drop() {
    let allocator = block_allocator();
    let counter = AtomicUsize::new(0);
    let arg = &counter as *const AtomicUsize as usize;

    let buffer = make_buffer(&allocator);
    buffer.register_on_destroy_notify(bump_counter, arg).unwrap();

    let clones: Vec<Buffer> = (0..8).map(|_| buffer.clone()).collect();
    drop(buffer);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let handles: Vec<_> = clones
        .into_iter()
        .map(|clone| std::thread::spawn(move || drop(clone)))
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[derive(Debug, PartialEq)]
struct Number1Info(i32);

impl BufferInfo for Number1Info {}

#[derive(Debug, PartialEq)]
struct Number2Info(i32);

impl BufferInfo for Number2Info {}

#[test]
fn test_buffer_info_at_most_one_per_type() {
    let allocator = block_allocator();
    let buffer = make_buffer(&allocator);

    assert!(buffer.infos().is_empty());
    assert!(!buffer.has_info::<Number1Info>());
    assert!(!buffer.has_info::<Number2Info>());

    buffer.set_info(Arc::new(Number1Info(1)));
    assert_eq!(buffer.infos().len(), 1);
    assert_eq!(*buffer.info::<Number1Info>().unwrap(), Number1Info(1));
    assert!(buffer.has_info::<Number1Info>());
    assert!(!buffer.has_info::<Number2Info>());

    buffer.set_info(Arc::new(Number2Info(2)));
    assert_eq!(buffer.infos().len(), 2);
    assert!(buffer.has_info::<Number1Info>());
    assert!(buffer.has_info::<Number2Info>());

    let removed = buffer.remove_info::<Number1Info>().unwrap();
    assert_eq!(*downcast_info::<Number1Info>(removed).unwrap(), Number1Info(1));
    assert_eq!(buffer.infos().len(), 1);
    assert!(!buffer.has_info::<Number1Info>());
    assert!(buffer.has_info::<Number2Info>());

    // Removing an absent type is a normal outcome, not an error, and
    // leaves the state untouched.
    assert!(buffer.remove_info::<Number1Info>().is_none());
    assert_eq!(buffer.infos().len(), 1);

    // Setting replaces, never appends.
    buffer.set_info(Arc::new(Number2Info(3)));
    assert_eq!(buffer.infos().len(), 1);
    assert_eq!(*buffer.info::<Number2Info>().unwrap(), Number2Info(3));

    let removed = buffer.remove_info::<Number2Info>().unwrap();
    assert_eq!(*downcast_info::<Number2Info>(removed).unwrap(), Number2Info(3));
    assert!(buffer.infos().is_empty());
    assert!(!buffer.has_info::<Number1Info>());
    assert!(!buffer.has_info::<Number2Info>());
}

#[test]
fn test_buffer_data_survives_shared_ownership() {
    let allocator = block_allocator();
    let block = allocator.allocate_linear_block(256, rw()).unwrap();

    let mut view = block.map().acquire().unwrap();
    let seed = fastrand::u64(..);
    let mut rng = fastrand::Rng::with_seed(seed);
    rng.fill(view.data_mut());
    let expected = view.data().to_vec();
    drop(view);

    let buffer = Buffer::from_linear_blocks(vec![
        block.share(0, 256, fence::ready()).unwrap(),
    ]);
    drop(block);
    let clone = buffer.clone();
    drop(buffer);

    assert_eq!(clone.data().kind(), BufferKind::Linear);
    let read = clone.data().linear_blocks()[0].map().acquire().unwrap();
    assert_eq!(read.data(), &expected[..], "seed {seed}");
}
