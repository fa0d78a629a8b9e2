//! Execution context: one frame of the invocation stack.

use crate::call_flags::CallFlags;
use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::ExceptionHandlingContext;
use crate::instruction::Instruction;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::slot::Slot;

/// One frame: a script with an instruction pointer, its own evaluation
/// stack and try stack, and slot handles that CALL-created frames share
/// with their creator.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    script: Script,
    instruction_pointer: usize,
    /// How many items RET returns: -1 means the whole stack.
    rvcount: i32,
    evaluation_stack: EvaluationStack,
    static_fields: Option<Slot>,
    local_variables: Option<Slot>,
    arguments: Option<Slot>,
    try_stack: Vec<ExceptionHandlingContext>,
    /// What this frame may do; narrowed on inter-contract calls.
    call_flags: CallFlags,
    /// Host cookie: index of the application-level frame this context
    /// belongs to. The VM itself never interprets it.
    frame_tag: usize,
}

impl ExecutionContext {
    /// Creates a root or called frame over `script`.
    pub fn new(script: Script, rvcount: i32, reference_counter: &ReferenceCounter) -> Self {
        Self {
            script,
            instruction_pointer: 0,
            rvcount,
            evaluation_stack: EvaluationStack::new(reference_counter.clone()),
            static_fields: None,
            local_variables: None,
            arguments: None,
            try_stack: Vec::new(),
            call_flags: CallFlags::ALL,
            frame_tag: 0,
        }
    }

    /// A CALL/CALLA frame: same script and slots, fresh evaluation and try
    /// stacks, starting at `position`.
    pub fn clone_at(&self, position: usize, reference_counter: &ReferenceCounter) -> Self {
        Self {
            script: self.script.clone(),
            instruction_pointer: position,
            rvcount: -1,
            evaluation_stack: EvaluationStack::new(reference_counter.clone()),
            static_fields: self.static_fields.clone(),
            local_variables: self.local_variables.clone(),
            arguments: self.arguments.clone(),
            try_stack: Vec::new(),
            call_flags: self.call_flags,
            frame_tag: self.frame_tag,
        }
    }

    /// The script this frame executes.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Current instruction pointer.
    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Moves the instruction pointer.
    pub fn set_instruction_pointer(&mut self, position: usize) {
        self.instruction_pointer = position;
    }

    /// The RET item count contract (-1 = all).
    pub fn rvcount(&self) -> i32 {
        self.rvcount
    }

    /// Decodes the instruction under the pointer; `None` at end of script
    /// (implicit RET).
    pub fn current_instruction(&self) -> VmResult<Option<Instruction>> {
        if self.instruction_pointer >= self.script.len() {
            return Ok(None);
        }
        self.script
            .instruction_at(self.instruction_pointer)
            .map(Some)
    }

    /// This frame's evaluation stack.
    pub fn evaluation_stack(&self) -> &EvaluationStack {
        &self.evaluation_stack
    }

    /// This frame's evaluation stack, mutable.
    pub fn evaluation_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.evaluation_stack
    }

    /// Static field slot, if initialized.
    pub fn static_fields(&self) -> Option<&Slot> {
        self.static_fields.as_ref()
    }

    /// Installs the static field slot (INITSSLOT).
    pub fn set_static_fields(&mut self, slot: Slot) -> VmResult<()> {
        if self.static_fields.is_some() {
            return Err(VmError::invalid_operation("INITSSLOT executed twice"));
        }
        self.static_fields = Some(slot);
        Ok(())
    }

    /// Local variable slot, if initialized.
    pub fn local_variables(&self) -> Option<&Slot> {
        self.local_variables.as_ref()
    }

    /// Argument slot, if initialized.
    pub fn arguments(&self) -> Option<&Slot> {
        self.arguments.as_ref()
    }

    /// Installs local and argument slots (INITSLOT).
    pub fn init_slots(&mut self, locals: Option<Slot>, arguments: Option<Slot>) -> VmResult<()> {
        if self.local_variables.is_some() || self.arguments.is_some() {
            return Err(VmError::invalid_operation("INITSLOT executed twice"));
        }
        self.local_variables = locals;
        self.arguments = arguments;
        Ok(())
    }

    /// Number of active try frames.
    pub fn try_stack_len(&self) -> usize {
        self.try_stack.len()
    }

    /// Pushes a try frame.
    pub fn push_try(&mut self, frame: ExceptionHandlingContext) {
        self.try_stack.push(frame);
    }

    /// Pops the innermost try frame.
    pub fn pop_try(&mut self) -> Option<ExceptionHandlingContext> {
        self.try_stack.pop()
    }

    /// The innermost try frame.
    pub fn try_peek(&self) -> Option<&ExceptionHandlingContext> {
        self.try_stack.last()
    }

    /// The innermost try frame, mutable.
    pub fn try_peek_mut(&mut self) -> Option<&mut ExceptionHandlingContext> {
        self.try_stack.last_mut()
    }

    /// This frame's call flags.
    pub fn call_flags(&self) -> CallFlags {
        self.call_flags
    }

    /// Narrows or sets the frame's call flags.
    pub fn set_call_flags(&mut self, flags: CallFlags) {
        self.call_flags = flags;
    }

    /// Host cookie accessor.
    pub fn frame_tag(&self) -> usize {
        self.frame_tag
    }

    /// Host cookie setter.
    pub fn set_frame_tag(&mut self, tag: usize) {
        self.frame_tag = tag;
    }

    /// Releases slot and stack references held by this frame. Shared slots
    /// are released by the last frame holding them.
    pub fn release_references(&mut self) {
        self.evaluation_stack.clear();
        for slot in [
            self.static_fields.take(),
            self.local_variables.take(),
            self.arguments.take(),
        ]
        .into_iter()
        .flatten()
        {
            if !slot.is_shared() {
                slot.clear_references();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_code::OpCode;

    fn context() -> ExecutionContext {
        let script = Script::new(vec![OpCode::PUSH1 as u8, OpCode::RET as u8]);
        ExecutionContext::new(script, -1, &ReferenceCounter::new())
    }

    #[test]
    fn end_of_script_is_implicit_ret() {
        let mut ctx = context();
        ctx.set_instruction_pointer(2);
        assert!(ctx.current_instruction().unwrap().is_none());
    }

    #[test]
    fn slots_initialize_once() {
        let rc = ReferenceCounter::new();
        let mut ctx = context();
        ctx.init_slots(Some(Slot::new(1, rc.clone())), None).unwrap();
        assert!(ctx.init_slots(Some(Slot::new(1, rc)), None).is_err());
    }

    #[test]
    fn call_clone_shares_slots() {
        let rc = ReferenceCounter::new();
        let mut ctx = context();
        ctx.set_static_fields(Slot::new(2, rc.clone())).unwrap();
        let clone = ctx.clone_at(0, &rc);
        clone
            .static_fields()
            .unwrap()
            .set(0, crate::stack_item::StackItem::from_int(9))
            .unwrap();
        assert_eq!(
            ctx.static_fields().unwrap().get(0).unwrap().as_int().unwrap(),
            9.into()
        );
    }
}
