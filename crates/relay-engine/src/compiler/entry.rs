//! Function Entry Dispatcher
//!
//! Turns a lowered body into the function's resumable entry routine: appends
//! the implicit return, resolves jump targets, and builds the label-indexed
//! switch once the final label count is known.

use super::error::{LowerError, LowerResult};
use super::frame_type::FrameType;
use super::ir::{DispatchSwitch, Instr, LabelId, LoweredFunction, MarkId, Target, YieldRequest};
use crate::ast::{FunctionId, FunctionInfo};
use rustc_hash::FxHashMap;

/// Assemble the entry routine of one function
pub(crate) fn assemble(
    id: FunctionId,
    info: &FunctionInfo,
    frame_type: FrameType,
    mut body: Vec<Instr>,
    label_count: u32,
    verify: bool,
) -> LowerResult<LoweredFunction> {
    // Running off the end is an implicit `return`.
    body.push(Instr::Yield(YieldRequest::Return));
    body.push(Instr::Exit);

    let fail = |message: String| LowerError::Verification {
        function: info.name.clone(),
        message,
    };

    let mut labels: FxHashMap<LabelId, usize> = FxHashMap::default();
    let mut marks: FxHashMap<MarkId, usize> = FxHashMap::default();
    for (pc, instr) in body.iter().enumerate() {
        match instr {
            Instr::Label(label) => {
                if labels.insert(*label, pc).is_some() {
                    return Err(fail(format!("label {} emitted twice", label)));
                }
            }
            Instr::Mark(mark) => {
                if marks.insert(*mark, pc).is_some() {
                    return Err(fail(format!("mark {} emitted twice", mark)));
                }
            }
            _ => {}
        }
    }

    let dispatch = if label_count > 0 {
        let targets = (1..=label_count)
            .map(|n| {
                labels
                    .get(&LabelId(n))
                    .copied()
                    .ok_or_else(|| fail(format!("label L{} issued but never emitted", n)))
            })
            .collect::<LowerResult<Vec<_>>>()?;
        Some(DispatchSwitch { targets })
    } else {
        None
    };

    let function = LoweredFunction {
        id,
        name: info.name.clone(),
        owner: info.owner,
        frame_type,
        label_count,
        dispatch,
        body,
        marks,
    };

    if verify {
        verify_function(&function, labels.len()).map_err(fail)?;
    }
    Ok(function)
}

/// Structural checks on an assembled routine
fn verify_function(function: &LoweredFunction, emitted_labels: usize) -> Result<(), String> {
    if emitted_labels != function.label_count as usize {
        return Err(format!(
            "{} labels emitted but {} issued",
            emitted_labels, function.label_count
        ));
    }
    if function.frame_type.slot_count() < function.frame_type.param_count() {
        return Err("frame has fewer slots than parameters".to_string());
    }

    for (pc, instr) in function.body.iter().enumerate() {
        let targets: Vec<Target> = match instr {
            Instr::Jump(target) | Instr::JumpIfFalse { target, .. } => vec![*target],
            Instr::DispatchReceive(arms) => arms.iter().map(|arm| Target::Label(arm.entry)).collect(),
            Instr::PropagateSuspension { resume, .. } => vec![Target::Label(*resume)],
            Instr::Yield(request) => request.resume_label().map(Target::Label).into_iter().collect(),
            _ => Vec::new(),
        };
        for target in targets {
            if function.position(target).is_none() {
                return Err(format!("instruction @{} targets a missing {:?}", pc, target));
            }
        }

        // A landing label must directly follow the exit of its own yield.
        if let Instr::Yield(request) = instr {
            if let Some(resume) = request.resume_label() {
                let follows = function.body.get(pc + 1) == Some(&Instr::Exit)
                    && function.body.get(pc + 2) == Some(&Instr::Label(resume));
                if !follows {
                    return Err(format!("yield @{} is not followed by exit and {}", pc, resume));
                }
            }
        }
    }

    match function.body.last() {
        Some(last) if last.leaves_call() => Ok(()),
        _ => Err("body does not end by leaving the call".to_string()),
    }
}
