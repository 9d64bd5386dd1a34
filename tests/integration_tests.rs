//! End-to-end behaviour of a `Context`: lifecycle, ownership cascades,
//! destructor failure reporting and the rendered error report.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use flow_context::{
    AllocError, Context, ContextConfig, ContextState, Destructor, Frame, Owner, SourceLocation,
    Status, format_bounded, raise, trace_frame,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn new_context() -> Context {
    init_tracing();
    let context = Context::try_new().unwrap();
    assert!(!context.print_if_error());
    context
}

fn tattletale(flag: &Rc<Cell<bool>>) -> Option<Destructor> {
    let flag = Rc::clone(flag);
    Some(Destructor::new(move |_, _| {
        flag.set(true);
        true
    }))
}

fn render(context: &Context) -> String {
    let mut buf = [0u8; 4096];
    let written = context.render_error(&mut buf, false).unwrap();
    assert!(written > 0);
    assert_eq!(buf[written], 0);
    String::from_utf8(buf[..written].to_vec()).unwrap()
}

#[test]
fn test_context_creation() {
    let context = new_context();
    assert!(!context.has_error());
    assert_eq!(context.state(), ContextState::Active);
    context.destroy();
}

#[test]
fn test_terminate_without_allocations() {
    let mut context = new_context();
    assert!(context.begin_terminate());
    assert_eq!(context.state(), ContextState::Terminating);
    assert!(!context.has_error());
    context.destroy();
}

#[test]
fn test_error_message_printing() {
    let mut context = new_context();

    raise!(
        context,
        Status::InvalidArgument,
        "You passed a value outside [0,1]: {}",
        3
    );

    let report = render(&context);
    assert!(
        report.starts_with(
            "Invalid argument : You passed a value outside [0,1]: 3\nintegration_tests.rs:"
        ),
        "{report}"
    );
    assert!(report.contains(": in function integration_tests::test_error_message_printing\n"));
    context.destroy();
}

#[test]
fn test_error_message_with_unknown_file_and_function() {
    let mut context = new_context();

    context.raise(Status::InvalidArgument, Frame::new(None, None, 25), None);

    assert_eq!(
        render(&context),
        "Invalid argument\n(unknown):25: in function (unknown)\n"
    );
    context.destroy();
}

#[test]
fn test_full_paths_are_kept_on_request() {
    let mut context = new_context();
    context.raise(
        Status::IoError,
        Frame::new(Some("src/io/reader.rs"), Some("fill"), 7),
        None,
    );

    let mut buf = [0u8; 128];
    let written = context.render_error(&mut buf, true).unwrap();
    assert_eq!(
        &buf[..written],
        b"I/O error\nsrc/io/reader.rs:7: in function fill\n"
    );
}

#[test]
fn test_failing_destructor_is_reported() {
    let mut context = new_context();

    context
        .allocate(20, Some(Destructor::new(|_, _| false)), Owner::Context)
        .unwrap();

    assert!(!context.begin_terminate());
    assert_eq!(context.status(), Status::DestructorFailed);
    assert_eq!(context.error_code(), 90);

    let report = render(&context);
    assert!(
        report.starts_with("Other error: : Destructor returned false, indicating failure"),
        "{report}"
    );
    assert!(report.contains("integration_tests.rs:"));

    // Destroying after a failed termination neither re-runs nor re-reports.
    context.destroy();
}

#[test]
fn test_destructor_runs_on_terminate() {
    let mut context = new_context();
    let called = Rc::new(Cell::new(false));

    context.allocate(20, tattletale(&called), Owner::Context).unwrap();

    assert!(context.begin_terminate());
    assert!(called.get());
    context.destroy();
}

#[test]
fn test_ownership_cascade() {
    let mut context = new_context();
    let called = Rc::new(Cell::new(false));

    let container = context.allocate_owned_by_context(10).unwrap();
    let data = context
        .allocate(20, tattletale(&called), Owner::Block(container))
        .unwrap();

    assert!(context.destroy_block(container));
    assert!(called.get());
    assert!(!context.contains(data));
    assert!(!context.contains(container));

    called.set(false);
    assert!(context.begin_terminate());
    assert!(!called.get());
    context.destroy();
}

#[test]
fn test_failure_does_not_stop_sibling_teardown() {
    let mut context = new_context();
    let order = Rc::new(RefCell::new(Vec::new()));
    let record = |name: &'static str, ok: bool| {
        let order = Rc::clone(&order);
        Some(Destructor::new(move |_, _| {
            order.borrow_mut().push(name);
            ok
        }))
    };

    let parent = context.allocate(1, record("parent", true), Owner::Context).unwrap();
    context.allocate(1, record("first", true), Owner::Block(parent)).unwrap();
    context.allocate(1, record("broken", false), Owner::Block(parent)).unwrap();
    context.allocate(1, record("last", true), Owner::Block(parent)).unwrap();

    assert!(!context.destroy_block(parent));
    assert_eq!(*order.borrow(), ["last", "broken", "first", "parent"]);
    assert_eq!(context.memory_stats().live_blocks, 0);
    assert_eq!(context.status(), Status::DestructorFailed);
}

#[test]
fn test_every_descendant_destroyed_once_in_post_order() {
    let mut context = new_context();
    let log = Rc::new(RefCell::new(Vec::new()));

    // A complete binary tree, seven levels deep.
    let mut blocks = Vec::new();
    for index in 0..127usize {
        let owner = if index == 0 {
            Owner::Context
        } else {
            Owner::Block(blocks[(index - 1) / 2])
        };
        let log = Rc::clone(&log);
        let destructor = Destructor::new(move |context: &mut Context, block| {
            // Children are already gone when their owner's destructor runs.
            let orphaned = context
                .allocations()
                .any(|info| info.owner == Owner::Block(block));
            log.borrow_mut().push((index, orphaned));
            true
        });
        blocks.push(context.allocate(1, Some(destructor), owner).unwrap());
    }

    assert!(context.destroy_block(blocks[0]));

    let log = log.borrow();
    assert_eq!(log.len(), 127);
    assert!(log.iter().all(|&(_, orphaned)| !orphaned));
    let mut seen: Vec<usize> = log.iter().map(|&(index, _)| index).collect();
    for (position, &index) in seen.iter().enumerate() {
        for child in [2 * index + 1, 2 * index + 2] {
            if child < 127 {
                let child_position = seen.iter().position(|&i| i == child).unwrap();
                assert!(child_position < position);
            }
        }
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 127);
}

#[test]
fn test_terminate_destroys_roots_newest_first() {
    let mut context = new_context();
    let order = Rc::new(RefCell::new(Vec::new()));
    for name in ["a", "b", "c"] {
        let order = Rc::clone(&order);
        context
            .allocate(
                4,
                Some(Destructor::new(move |_, _| {
                    order.borrow_mut().push(name);
                    true
                })),
                Owner::Context,
            )
            .unwrap();
    }

    assert!(context.begin_terminate());
    assert_eq!(*order.borrow(), ["c", "b", "a"]);
    assert_eq!(context.memory_stats().live_bytes, 0);
}

#[test]
fn test_destroy_skips_destructors() {
    let called = Rc::new(Cell::new(false));
    let mut context = new_context();
    context.allocate(8, tattletale(&called), Owner::Context).unwrap();
    context.destroy();
    assert!(!called.get());

    let mut context = new_context();
    context.allocate(8, tattletale(&called), Owner::Context).unwrap();
    drop(context);
    assert!(!called.get());
}

#[test]
fn test_out_of_memory() {
    let mut context = new_context();

    let error = context.allocate_owned_by_context(usize::MAX).unwrap_err();
    assert_eq!(error, AllocError::OutOfMemory { size: usize::MAX });
    assert_eq!(context.status(), Status::OutOfMemory);
    assert!(render(&context).starts_with("Out Of Memory : Failed to allocate"));
}

#[test]
fn test_unknown_owner() {
    let mut context = new_context();
    let gone = context.allocate_owned_by_context(1).unwrap();
    assert!(context.destroy_block(gone));

    assert_eq!(
        context.allocate(1, None, Owner::Block(gone)),
        Err(AllocError::UnknownOwner(gone))
    );
    assert_eq!(context.status(), Status::ItemDoesNotExist);
    assert_eq!(context.memory_stats().live_blocks, 0);
}

#[test]
fn test_reparenting() {
    let mut context = new_context();
    let called = Rc::new(Cell::new(false));

    let a = context.allocate_owned_by_context(1).unwrap();
    let b = context.allocate(1, None, Owner::Block(a)).unwrap();
    let c = context.allocate(1, tattletale(&called), Owner::Context).unwrap();

    assert!(!context.set_owner(a, Owner::Block(b)));
    assert_eq!(context.status(), Status::InvalidArgument);
    assert!(!context.set_owner(a, Owner::Block(a)));
    context.clear_error();

    assert!(context.set_owner(c, Owner::Block(b)));
    assert_eq!(context.owner_of(c), Some(Owner::Block(b)));
    assert!(!context.has_error());

    assert!(context.destroy_block(a));
    assert!(called.get());
    assert!(!context.contains(c));
}

#[test]
fn test_set_destructor_replaces_without_running() {
    let mut context = new_context();
    let first = Rc::new(Cell::new(false));
    let second = Rc::new(Cell::new(false));

    let block = context.allocate(4, tattletale(&first), Owner::Context).unwrap();
    assert!(context.set_destructor(block, tattletale(&second)));
    assert!(!first.get());

    assert!(context.destroy_block(block));
    assert!(!first.get());
    assert!(second.get());
}

#[test]
fn test_reallocate_keeps_contents_children_and_destructor() {
    let mut context = new_context();
    let called = Rc::new(Cell::new(false));

    let parent = context.allocate(4, tattletale(&called), Owner::Context).unwrap();
    let child = context.allocate(2, None, Owner::Block(parent)).unwrap();
    context.block_mut(parent).unwrap().copy_from_slice(&[1, 2, 3, 4]);

    let parent = context.reallocate(parent, 4096).unwrap();
    assert_eq!(context.size_of(parent), Some(4096));
    let contents = context.block(parent).unwrap();
    assert_eq!(&contents[..4], &[1, 2, 3, 4]);
    assert!(contents[4..].iter().all(|&byte| byte == 0));
    assert_eq!(context.owner_of(child), Some(Owner::Block(parent)));
    assert_eq!(context.memory_stats().live_bytes, 4096 + 2);

    let failed = context.reallocate(parent, usize::MAX);
    assert_eq!(failed, Err(AllocError::OutOfMemory { size: usize::MAX }));
    assert_eq!(context.size_of(parent), Some(4096));
    assert_eq!(context.status(), Status::OutOfMemory);

    assert!(context.destroy_block(parent));
    assert!(called.get());
    assert!(!context.contains(child));
}

#[test]
fn test_allocation_site_is_recorded() {
    let mut context = new_context();
    let here = line!() + 1;
    let block = context.allocate_owned_by_context(3).unwrap();
    let at = context
        .allocate_at(5, None, Owner::Block(block), SourceLocation::new("gen/shim.rs", 9, 1))
        .unwrap();

    let mut infos: Vec<_> = context.allocations().collect();
    infos.sort_by_key(|info| info.size);
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].address, block);
    assert_eq!(infos[0].location.line, here);
    assert!(infos[0].location.file.ends_with("integration_tests.rs"));
    assert_eq!(infos[0].children, 1);
    assert_eq!(infos[1].address, at);
    assert_eq!(infos[1].location.file, "gen/shim.rs");
    assert!(!infos[1].has_destructor);
}

#[test]
fn test_first_raise_wins_and_frames_accumulate() {
    let mut context = new_context();

    fn inner(context: &mut Context) {
        raise!(context, Status::ImageDecodingFailed, "truncated stream");
    }
    fn outer(context: &mut Context) {
        inner(context);
        raise!(context, Status::IoError, "never shown");
        assert!(trace_frame!(context));
    }
    outer(&mut context);

    let error = context.error().unwrap();
    assert_eq!(error.status(), Status::ImageDecodingFailed);
    assert_eq!(error.message(), Some("truncated stream"));
    assert_eq!(error.frames().len(), 3);
    assert!(error.frames()[0].function.as_deref().unwrap().ends_with("inner"));
    assert!(error.frames()[1].function.as_deref().unwrap().ends_with("outer"));
}

#[test]
fn test_trace_frame_without_error() {
    let mut context = new_context();
    assert!(!trace_frame!(context));
    assert!(!context.has_error());
}

#[test]
fn test_frame_and_message_limits() {
    init_tracing();
    let config = ContextConfig::new().max_frames(3).max_message_len(8);
    let mut context = Context::try_with_config(config).unwrap();

    raise!(context, Status::Other, "{}", "a rather long message");
    for line in 0..10 {
        context.raise(Status::Other, Frame::unknown(line), None);
    }

    let error = context.error().unwrap();
    assert_eq!(error.message(), Some("a rather"));
    assert_eq!(error.frames().len(), 3);
    assert!(!context.add_to_callstack(Frame::unknown(99)));
}

#[test]
fn test_clear_allows_new_root_cause() {
    let mut context = new_context();
    raise!(context, Status::NullArgument);
    assert_eq!(context.error_code(), 51);

    context.clear_error();
    assert!(!context.has_error());
    assert_eq!(context.status(), Status::NoError);
    assert_eq!(context.error_report(false).to_string(), "No error\n");

    raise!(context, Status::GraphIsCyclic, "node {} loops", 4);
    assert!(render(&context).starts_with("Graph is cyclic : node 4 loops\n"));
    assert_eq!(context.error().unwrap().frames().len(), 1);
}

#[test]
fn test_user_defined_status_keeps_its_code() {
    assert_eq!(Status::user_defined(0), None);
    assert_eq!(Status::user_defined(50), None);

    let mut context = new_context();
    let status = Status::user_defined(4096).unwrap();
    raise!(context, status, "collaborator failure");
    assert!(context.has_error());
    assert_eq!(context.error_code(), 4096);
    assert_eq!(Status::from_code(context.error_code()), Some(status));
    assert!(render(&context).starts_with("User defined error : collaborator failure\n"));
}

#[test]
fn test_render_truncates_safely() {
    let mut context = new_context();
    context.raise(
        Status::InvalidArgument,
        Frame::new(Some("a.rs"), Some("f"), 1),
        Some(format_args!("0123456789")),
    );

    let mut buf = [0xAAu8; 16];
    let result = context.render_error(&mut buf[..12], false);
    assert_eq!(result, Err(flow_context::FormatError::Truncated { written: 11 }));
    assert_eq!(&buf[..12], b"Invalid arg\0");
    assert!(buf[12..].iter().all(|&byte| byte == 0xAA));

    assert_eq!(
        context.render_error(&mut buf[..0], false),
        Err(flow_context::FormatError::ZeroCapacity)
    );
}

#[test]
fn test_bounded_formatter_contract() {
    let mut buf = [3u8, 25];
    assert_eq!(
        flow_context::result_as_sentinel(format_bounded!(&mut buf[..1], "hello")),
        -1
    );
    assert_eq!(buf, [0, 25]);

    let mut buf = [0u8; 7];
    buf[6] = 25;
    assert_eq!(format_bounded!(&mut buf[..6], "hello"), Ok(5));
    assert_eq!(buf[5], 0);
    assert_eq!(buf[6], 25);
}
