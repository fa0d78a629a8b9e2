//! The execution engine: invocation stack, step loop, exception unwinding.

use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::{ExceptionHandlingContext, ExceptionHandlingState};
use crate::execution_context::ExecutionContext;
use crate::execution_engine_limits::ExecutionEngineLimits;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::stack_item::StackItem;
use crate::vm_state::VMState;
use tracing::debug;

/// Record of a context leaving the invocation stack, drained by the host
/// after each step to reconcile its own frame bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct ContextUnloadEvent {
    /// Invocation stack depth before the pop (the popped context's 1-based
    /// position).
    pub depth_before_pop: usize,
    /// True when the context was unwound by an exception rather than RET.
    pub exceptional: bool,
}

/// Host hooks for the step loop. The standalone VM uses a no-op host that
/// cannot answer syscalls; the application engine supplies the real one.
pub trait ExecutionHost {
    /// Called before an instruction is dispatched (gas metering).
    fn pre_instruction(
        &mut self,
        engine: &mut ExecutionEngine,
        instruction: &Instruction,
    ) -> VmResult<()> {
        let _ = (engine, instruction);
        Ok(())
    }

    /// Handles SYSCALL.
    fn on_syscall(&mut self, engine: &mut ExecutionEngine, id: u32) -> VmResult<()> {
        let _ = engine;
        Err(VmError::invalid_operation(format!(
            "syscall {id:#010x} requires an application engine"
        )))
    }

    /// Handles CALLT.
    fn on_call_token(&mut self, engine: &mut ExecutionEngine, token: u16) -> VmResult<()> {
        let _ = engine;
        Err(VmError::invalid_operation(format!(
            "method token {token} requires an application engine"
        )))
    }
}

/// The no-op host for standalone VM execution.
struct BareHost;

impl ExecutionHost for BareHost {}

/// A NeoVM execution engine instance.
pub struct ExecutionEngine {
    state: VMState,
    /// Set by jumps and context transitions to suppress the automatic
    /// instruction-pointer advance.
    is_jumping: bool,
    jump_table: JumpTable,
    limits: ExecutionEngineLimits,
    reference_counter: ReferenceCounter,
    invocation_stack: Vec<ExecutionContext>,
    result_stack: EvaluationStack,
    uncaught_exception: Option<StackItem>,
    fault_reason: Option<VmError>,
    unload_events: Vec<ContextUnloadEvent>,
}

impl ExecutionEngine {
    /// Creates an engine with default limits.
    pub fn new() -> ExecutionEngine {
        ExecutionEngine::with_limits(ExecutionEngineLimits::default())
    }

    /// Creates an engine with the given limits.
    pub fn with_limits(limits: ExecutionEngineLimits) -> ExecutionEngine {
        let reference_counter = ReferenceCounter::new();
        ExecutionEngine {
            state: VMState::BREAK,
            is_jumping: false,
            jump_table: JumpTable::new(),
            limits,
            reference_counter: reference_counter.clone(),
            invocation_stack: Vec::new(),
            result_stack: EvaluationStack::new(reference_counter),
            uncaught_exception: None,
            fault_reason: None,
            unload_events: Vec::new(),
        }
    }

    /// Current state tag.
    pub fn state(&self) -> VMState {
        self.state
    }

    /// Forces the state tag.
    pub fn set_state(&mut self, state: VMState) {
        self.state = state;
    }

    /// The engine's limits.
    pub fn limits(&self) -> &ExecutionEngineLimits {
        &self.limits
    }

    /// The engine's reference counter.
    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    /// The invocation stack, bottom-first.
    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    /// The current (top) context.
    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    /// The current context, mutable.
    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    /// The entry (bottom) context.
    pub fn entry_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.first()
    }

    /// The result stack (valid after HALT).
    pub fn result_stack(&self) -> &EvaluationStack {
        &self.result_stack
    }

    /// The result stack, mutable.
    pub fn result_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.result_stack
    }

    /// The fault item attached on FAULT, if any.
    pub fn uncaught_exception(&self) -> Option<&StackItem> {
        self.uncaught_exception.as_ref()
    }

    /// The error that faulted the engine, if any.
    pub fn fault_reason(&self) -> Option<&VmError> {
        self.fault_reason.as_ref()
    }

    /// Drains the context-unload events recorded since the last call.
    pub fn take_unload_events(&mut self) -> Vec<ContextUnloadEvent> {
        std::mem::take(&mut self.unload_events)
    }

    /// Requests that the automatic instruction-pointer advance be skipped
    /// for the instruction being executed.
    pub fn set_jumping(&mut self) {
        self.is_jumping = true;
    }

    /// Loads a script as a new context on the invocation stack.
    pub fn load_script(
        &mut self,
        script: Script,
        rvcount: i32,
        initial_position: usize,
    ) -> VmResult<()> {
        let mut context = ExecutionContext::new(script, rvcount, &self.reference_counter);
        context.set_instruction_pointer(initial_position);
        self.load_context(context)
    }

    /// Pushes a prepared context, enforcing the invocation depth limit.
    pub fn load_context(&mut self, context: ExecutionContext) -> VmResult<()> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_size {
            return Err(VmError::LimitExceeded {
                what: "invocation stack",
                value: self.invocation_stack.len() + 1,
                limit: self.limits.max_invocation_stack_size,
            });
        }
        self.invocation_stack.push(context);
        Ok(())
    }

    /// Peeks the current context's evaluation stack.
    pub fn peek(&self, index: usize) -> VmResult<&StackItem> {
        let context = self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        context.evaluation_stack().peek(index)
    }

    /// Pops from the current context's evaluation stack.
    pub fn pop(&mut self) -> VmResult<StackItem> {
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        context.evaluation_stack_mut().pop()
    }

    /// Pops and interprets as an integer.
    pub fn pop_int(&mut self) -> VmResult<num_bigint::BigInt> {
        self.pop()?.as_int()
    }

    /// Pops and interprets as a boolean.
    pub fn pop_bool(&mut self) -> VmResult<bool> {
        self.pop()?.as_bool()
    }

    /// Pushes onto the current context's evaluation stack, enforcing the
    /// integer cap and item-size limit on the pushed value.
    pub fn push(&mut self, item: StackItem) -> VmResult<()> {
        item.check_integer_cap()?;
        if let StackItem::ByteString(bytes) = &item {
            self.limits.assert_max_item_size(bytes.len())?;
        }
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        context.evaluation_stack_mut().push(item);
        Ok(())
    }

    /// Runs until HALT or FAULT without a host (syscalls fault).
    pub fn execute(&mut self) -> VMState {
        let mut host = BareHost;
        self.execute_with(&mut host)
    }

    /// Runs until HALT or FAULT with the given host.
    pub fn execute_with(&mut self, host: &mut dyn ExecutionHost) -> VMState {
        if self.state == VMState::BREAK {
            self.state = VMState::NONE;
        }
        while self.state != VMState::HALT && self.state != VMState::FAULT {
            if let Err(error) = self.execute_next(host) {
                self.on_fault(error);
            }
        }
        self.state
    }

    /// Executes one instruction (or the implicit RET at end of script).
    pub fn execute_next(&mut self, host: &mut dyn ExecutionHost) -> VmResult<()> {
        if self.state == VMState::HALT || self.state == VMState::FAULT {
            return Ok(());
        }
        if self.invocation_stack.is_empty() {
            self.state = VMState::HALT;
            return Ok(());
        }

        self.is_jumping = false;
        let pre_index = self.invocation_stack.len() - 1;
        let instruction = self.invocation_stack[pre_index].current_instruction()?;

        match instruction {
            None => {
                // Implicit RET when the pointer runs off the script.
                self.execute_ret()?;
            }
            Some(instruction) => {
                host.pre_instruction(self, &instruction)?;
                match instruction.opcode() {
                    OpCode::SYSCALL => {
                        host.on_syscall(self, instruction.token_u32())?;
                    }
                    OpCode::CALLT => {
                        host.on_call_token(self, instruction.token_u16())?;
                    }
                    opcode => {
                        let handler = self.jump_table.handler(opcode)?;
                        handler(self, &instruction)?;
                    }
                }
                if !self.is_jumping {
                    if let Some(context) = self.invocation_stack.get_mut(pre_index) {
                        let next = context.instruction_pointer() + instruction.size();
                        context.set_instruction_pointer(next);
                    }
                }
            }
        }
        self.is_jumping = false;
        self.post_execute()
    }

    fn post_execute(&mut self) -> VmResult<()> {
        if self.reference_counter.count() > self.limits.max_stack_size {
            let current = self.reference_counter.check_zero_referred();
            if current > self.limits.max_stack_size {
                return Err(VmError::LimitExceeded {
                    what: "stack size",
                    value: current,
                    limit: self.limits.max_stack_size,
                });
            }
        }
        Ok(())
    }

    /// Transitions to FAULT, attaching the error as the fault item.
    pub fn on_fault(&mut self, error: VmError) {
        debug!(%error, "engine fault");
        if self.uncaught_exception.is_none() {
            self.uncaught_exception = Some(StackItem::from_byte_string(
                error.to_string().into_bytes(),
            ));
        }
        self.fault_reason = Some(error);
        self.state = VMState::FAULT;
    }

    /// RET: pops the current context and transfers its evaluation stack to
    /// the caller (or the result stack), preserving order.
    pub fn execute_ret(&mut self) -> VmResult<()> {
        let mut context = self
            .invocation_stack
            .pop()
            .ok_or_else(|| VmError::invalid_operation("RET without a context"))?;
        let depth_before_pop = self.invocation_stack.len() + 1;

        let rvcount = context.rvcount();
        let stack_len = context.evaluation_stack().len();
        if rvcount >= 0 && stack_len != rvcount as usize {
            return Err(VmError::invalid_operation(format!(
                "RET expected {rvcount} result items, found {stack_len}"
            )));
        }

        let items = context.evaluation_stack_mut().drain_all();
        context.release_references();
        self.unload_events.push(ContextUnloadEvent {
            depth_before_pop,
            exceptional: false,
        });

        if let Some(caller) = self.invocation_stack.last_mut() {
            for item in items {
                caller.evaluation_stack_mut().push(item);
            }
        } else {
            for item in items {
                self.result_stack.push(item);
            }
            self.reference_counter.check_zero_referred();
            self.state = VMState::HALT;
        }
        self.is_jumping = true;
        Ok(())
    }

    /// Absolute jump within the current context.
    pub fn execute_jump(&mut self, position: i32) -> VmResult<()> {
        let script_len = self
            .current_context()
            .map(|c| c.script().len())
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        if position < 0 || position as usize >= script_len {
            return Err(VmError::out_of_range(format!(
                "jump target {position} outside script of length {script_len}"
            )));
        }
        let context = self.current_context_mut().expect("context checked above");
        context.set_instruction_pointer(position as usize);
        self.is_jumping = true;
        Ok(())
    }

    /// Jump relative to the current instruction's own address.
    pub fn execute_jump_offset(&mut self, offset: i32) -> VmResult<()> {
        let base = self
            .current_context()
            .map(|c| c.instruction_pointer())
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        let target = (base as i64).checked_add(i64::from(offset)).ok_or_else(|| {
            VmError::out_of_range(format!("jump offset {offset} overflows the pointer"))
        })?;
        let target = i32::try_from(target)
            .map_err(|_| VmError::out_of_range(format!("jump target {target} out of range")))?;
        self.execute_jump(target)
    }

    /// CALL: pushes a frame sharing script and slots at `position`.
    pub fn execute_call(&mut self, position: usize) -> VmResult<()> {
        let context = self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        if position >= context.script().len() {
            return Err(VmError::out_of_range(format!(
                "call target {position} outside script"
            )));
        }
        let new_context = context.clone_at(position, &self.reference_counter);
        self.load_context(new_context)?;
        // The caller's pointer still advances past the CALL instruction;
        // only the automatic advance of the new context is suppressed by
        // it not being the captured pre-execution context.
        Ok(())
    }

    /// TRY: pushes an exception frame with the given relative offsets
    /// (zero meaning absent).
    pub fn execute_try(&mut self, catch_offset: i32, finally_offset: i32) -> VmResult<()> {
        if catch_offset == 0 && finally_offset == 0 {
            return Err(VmError::invalid_argument(
                "TRY needs a catch or a finally block",
            ));
        }
        let max_depth = self.limits.max_try_nesting_depth;
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        if context.try_stack_len() >= max_depth {
            return Err(VmError::LimitExceeded {
                what: "try nesting depth",
                value: context.try_stack_len() + 1,
                limit: max_depth,
            });
        }
        let base = context.instruction_pointer() as i32;
        let catch_pointer = if catch_offset == 0 {
            -1
        } else {
            base.checked_add(catch_offset)
                .ok_or_else(|| VmError::out_of_range("catch offset overflow".to_string()))?
        };
        let finally_pointer = if finally_offset == 0 {
            -1
        } else {
            base.checked_add(finally_offset)
                .ok_or_else(|| VmError::out_of_range("finally offset overflow".to_string()))?
        };
        context.push_try(ExceptionHandlingContext::new(catch_pointer, finally_pointer));
        Ok(())
    }

    /// ENDTRY: leaves the protected (or catch) block, visiting the finally
    /// block when one exists, then continuing at the end offset.
    pub fn execute_end_try(&mut self, end_offset: i32) -> VmResult<()> {
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        let base = context.instruction_pointer() as i32;
        let end_pointer = base
            .checked_add(end_offset)
            .ok_or_else(|| VmError::out_of_range("ENDTRY offset overflow".to_string()))?;

        let frame = context
            .try_peek()
            .ok_or_else(|| VmError::invalid_operation("ENDTRY without TRY"))?;
        if frame.state() == ExceptionHandlingState::Finally {
            return Err(VmError::invalid_operation("ENDTRY inside FINALLY"));
        }

        if frame.has_finally() {
            let finally_pointer = frame.finally_pointer();
            let frame = context.try_peek_mut().expect("frame checked above");
            frame.set_state(ExceptionHandlingState::Finally);
            frame.set_end_pointer(end_pointer);
            context.set_instruction_pointer(finally_pointer as usize);
        } else {
            context.pop_try();
            let target = usize::try_from(end_pointer)
                .map_err(|_| VmError::out_of_range("negative ENDTRY target".to_string()))?;
            context.set_instruction_pointer(target);
        }
        self.is_jumping = true;
        Ok(())
    }

    /// ENDFINALLY: pops the frame; resumes a pending exception or jumps to
    /// the recorded end offset.
    pub fn execute_end_finally(&mut self) -> VmResult<()> {
        let end_pointer = {
            let context = self
                .current_context_mut()
                .ok_or_else(|| VmError::invalid_operation("no current context"))?;
            let frame = context
                .try_peek()
                .ok_or_else(|| VmError::invalid_operation("ENDFINALLY without TRY"))?;
            if frame.state() != ExceptionHandlingState::Finally {
                return Err(VmError::invalid_operation("ENDFINALLY outside FINALLY"));
            }
            let end_pointer = frame.end_pointer();
            context.pop_try();
            end_pointer
        };

        if let Some(pending) = self.uncaught_exception.take() {
            self.execute_throw(pending)?;
        } else {
            let target = usize::try_from(end_pointer)
                .map_err(|_| VmError::out_of_range("negative ENDFINALLY target".to_string()))?;
            let context = self.current_context_mut().expect("context checked above");
            context.set_instruction_pointer(target);
            self.is_jumping = true;
        }
        Ok(())
    }

    /// THROW: unwinds contexts until an unused catch is found; without one
    /// the engine faults with the exception attached.
    pub fn execute_throw(&mut self, exception: StackItem) -> VmResult<()> {
        self.uncaught_exception = Some(exception);

        while !self.invocation_stack.is_empty() {
            // Walk the current context's try stack innermost-first.
            loop {
                let Some((state, has_catch, has_finally, catch_pointer, finally_pointer)) = self
                    .current_context()
                    .and_then(|context| context.try_peek())
                    .map(|frame| {
                        (
                            frame.state(),
                            frame.has_catch(),
                            frame.has_finally(),
                            frame.catch_pointer(),
                            frame.finally_pointer(),
                        )
                    })
                else {
                    break;
                };
                let context = self.current_context_mut().expect("context present");
                match state {
                    // A finally in flight, or a catch with no finally left
                    // to visit, is exhausted by this exception.
                    ExceptionHandlingState::Finally => {
                        context.pop_try();
                    }
                    ExceptionHandlingState::Catch if !has_finally => {
                        context.pop_try();
                    }
                    ExceptionHandlingState::Try if has_catch => {
                        let frame = context.try_peek_mut().expect("frame present");
                        frame.set_state(ExceptionHandlingState::Catch);
                        context.set_instruction_pointer(catch_pointer as usize);
                        let exception =
                            self.uncaught_exception.take().expect("exception in flight");
                        let context = self.current_context_mut().expect("context present");
                        context.evaluation_stack_mut().push(exception);
                        self.is_jumping = true;
                        return Ok(());
                    }
                    // No usable catch here: run the finally block with the
                    // exception pending.
                    _ => {
                        let frame = context.try_peek_mut().expect("frame present");
                        frame.set_state(ExceptionHandlingState::Finally);
                        context.set_instruction_pointer(finally_pointer as usize);
                        self.is_jumping = true;
                        return Ok(());
                    }
                }
            }

            // No try frame can handle it: unwind this context.
            let depth_before_pop = self.invocation_stack.len();
            let mut popped = self
                .invocation_stack
                .pop()
                .expect("context present in loop");
            popped.release_references();
            self.unload_events.push(ContextUnloadEvent {
                depth_before_pop,
                exceptional: true,
            });
        }

        let exception = self
            .uncaught_exception
            .as_ref()
            .expect("exception in flight");
        let message = exception
            .as_string()
            .unwrap_or_else(|_| exception.display_value());
        Err(VmError::Uncaught(message))
    }

    /// Discards the top context without transferring its evaluation stack
    /// anywhere. Used by the host to unwind a faulted callee before
    /// rethrowing at the call site.
    pub fn discard_context(&mut self) {
        if let Some(mut context) = self.invocation_stack.pop() {
            context.release_references();
            self.reference_counter.check_zero_referred();
        }
    }

    /// Final garbage-collection pass; exposed for HALT invariants.
    pub fn collect_garbage(&mut self) -> usize {
        self.reference_counter.check_zero_referred()
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_code::OpCode;

    #[test]
    fn fresh_engine_state() {
        let engine = ExecutionEngine::new();
        assert_eq!(engine.state(), VMState::BREAK);
        assert!(engine.invocation_stack().is_empty());
        assert!(engine.result_stack().is_empty());
        assert!(engine.uncaught_exception().is_none());
    }

    #[test]
    fn add_program_halts_with_result() {
        let mut engine = ExecutionEngine::new();
        let script = Script::new(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::ADD as u8,
            OpCode::RET as u8,
        ]);
        engine.load_script(script, -1, 0).unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        assert_eq!(engine.result_stack().len(), 1);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            3.into()
        );
    }

    #[test]
    fn invocation_depth_is_limited() {
        let mut engine = ExecutionEngine::with_limits(ExecutionEngineLimits {
            max_invocation_stack_size: 2,
            ..ExecutionEngineLimits::default()
        });
        let script = Script::new(vec![OpCode::RET as u8]);
        engine.load_script(script.clone(), -1, 0).unwrap();
        engine.load_script(script.clone(), -1, 0).unwrap();
        assert!(matches!(
            engine.load_script(script, -1, 0),
            Err(VmError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn syscall_without_host_faults() {
        let mut engine = ExecutionEngine::new();
        let script = Script::new(vec![OpCode::SYSCALL as u8, 1, 2, 3, 4]);
        engine.load_script(script, -1, 0).unwrap();
        assert_eq!(engine.execute(), VMState::FAULT);
        assert!(engine.fault_reason().is_some());
    }
}
