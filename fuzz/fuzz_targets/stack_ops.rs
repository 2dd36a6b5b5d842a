#![no_main]

use libfuzzer_sys::fuzz_target;

use execstack::runtime::{CallKind, ExecutionStack, ModuleAddr, Pc, StackConfig, Value};

// Drive the checked API with arbitrary operations. Every call must either
// succeed or return an error; none may panic or break the stack invariants.
fuzz_target!(|data: &[u8]| {
    let config = StackConfig::new().max_values(4096).max_frames(256);
    let mut stack: ExecutionStack = ExecutionStack::with_config(config);

    for (ip, chunk) in data.chunks(3).enumerate() {
        let (op, a, b) = match *chunk {
            [op, a, b] => (op, a as usize, b as usize),
            _ => break,
        };
        let pc = Pc::new(0, ip as u32, u32::MAX);
        // validated code never reaches below the current frame's values
        let floor = stack.current_frame().map_or(0, |frame| frame.value_base);
        let available = stack.size() - floor;
        let _ = match op % 10 {
            0 => stack.push_value(Value::I32(a as i32)),
            1 => stack.push_native(b as u64),
            2 if available > 0 => stack.try_pop().map(|_| ()),
            3 if a % 16 <= available => stack.try_erase_range(a % 16, b % 16),
            4 if a % 8 <= available => stack.try_push_frame(ModuleAddr(a), pc, a % 8, b % 4, CallKind::Call),
            5 => stack.try_push_frame(ModuleAddr(a), pc, a % 8, b % 4, CallKind::TailCall),
            6 => stack.try_pop_frame().map(|_| ()),
            7 => stack.try_local(a % 8).map(|_| ()),
            8 => stack.try_maybe_pop_frame(Pc::new(0, b as u32, a as u32)).map(|_| ()),
            9 => stack.try_top_n(a).map(|_| ()),
            _ => Ok(()),
        };
        assert!(stack.snapshot().validate().is_ok());
    }
});
