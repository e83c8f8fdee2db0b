//! Stack machine that walks a parsed shape graph.
//!
//! Each step executes the instruction of the current shape against a global
//! operand stack and then moves along one outgoing connection. Anything the
//! program prints, including banners and the verbose trace, goes to the
//! interpreter's writer.

pub mod value;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    algorithms::geometry::distance,
    classify::Opcode,
    error::{Result, ShapesError},
    types::{PathId, ShapeGraph, ShapeId, Slot, Target},
};

pub use value::{Value, format_stack};

const SEPARATOR: &str = "--------------------------------------";
const FINISHED: &str = "--------------|finished|--------------";
const DEAD_END: &str = "|finished due to dead-end|";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Print a trace of every step
    pub verbose: bool,
    /// Seconds to wait after each step; negative waits for enter
    pub delay: f64,
    /// Directory `READ` paths are resolved against
    pub home_dir: Option<PathBuf>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            delay: 0.0,
            home_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Halt {
    /// Reached an END shape
    Finished,
    /// Nowhere left to go
    DeadEnd,
    /// Cancelled from outside
    Aborted,
}

/// Everything that changes between steps apart from shape values.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    pub stack: Vec<Value>,
    pub current: ShapeId,
    /// Where the current shape was entered
    pub from_point: Point<i32>,
    /// Path the current shape was entered along
    pub from_key: Option<PathId>,
    pub steps: usize,
    pub halted: Option<Halt>,
}

impl MachineState {
    pub fn at(current: ShapeId, from_point: Point<i32>) -> Self {
        Self {
            stack: Vec::new(),
            current,
            from_point,
            from_key: None,
            steps: 0,
            halted: None,
        }
    }

    fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Pop `a` (the top) and `b` when both exist.
    fn pop_pair(&mut self) -> Option<(Value, Value)> {
        if self.stack.len() < 2 {
            return None;
        }
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        Some((a, b))
    }

    /// Restore a popped pair in its original order.
    fn push_back(&mut self, a: Value, b: Value) {
        self.stack.push(b);
        self.stack.push(a);
    }

    fn move_to(&mut self, path: PathId, target: Target) {
        self.current = target.shape;
        self.from_point = target.entry;
        self.from_key = Some(path);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub halt: Halt,
    pub steps: usize,
    pub stack: Vec<Value>,
}

pub struct Interpreter<R, W> {
    graph: ShapeGraph,
    config: InterpreterConfig,
    input: R,
    output: W,
    cancel: Arc<AtomicBool>,
    start: ShapeId,
}

impl<R: BufRead, W: Write> Interpreter<R, W> {
    pub fn new(graph: ShapeGraph, config: InterpreterConfig, input: R, output: W) -> Result<Self> {
        let start = find_start(&graph)?;
        Ok(Self {
            graph,
            config,
            input,
            output,
            cancel: Arc::new(AtomicBool::new(false)),
            start,
        })
    }

    /// Share an existing cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn graph(&self) -> &ShapeGraph {
        &self.graph
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn start(&self) -> ShapeId {
        self.start
    }

    pub fn initial_state(&self) -> MachineState {
        MachineState::at(self.start, self.graph[self.start].center)
    }

    /// Run from the start shape until the program halts or is cancelled.
    pub fn run(&mut self) -> Result<RunReport> {
        let mut state = self.initial_state();
        debug!(start = %self.start, "Running program");

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                writeln!(self.output, "|aborted!|")?;
                state.halted = Some(Halt::Aborted);
                break;
            }
            self.step(&mut state)?;
            if state.halted.is_some() {
                break;
            }
            self.pause()?;
        }
        self.output.flush()?;

        let halt = state.halted.unwrap_or(Halt::Finished);
        debug!(?halt, steps = state.steps, "Program halted");
        Ok(RunReport {
            halt,
            steps: state.steps,
            stack: state.stack,
        })
    }

    fn pause(&mut self) -> Result<()> {
        if self.config.delay > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(self.config.delay));
        } else if self.config.delay < 0.0 {
            write!(self.output, "|press enter|")?;
            self.output.flush()?;
            let mut line = String::new();
            self.input.read_line(&mut line)?;
        }
        Ok(())
    }

    /// Execute the current shape and move on.
    pub fn step(&mut self, state: &mut MachineState) -> Result<()> {
        let current = state.current;
        let opcode = self.graph.opcode(current);
        trace!(step = state.steps, shape = %current, %opcode, "Step");

        if self.config.verbose {
            writeln!(self.output, "|{}, current: {opcode}|", state.steps)?;
            writeln!(
                self.output,
                "|number of points of current: {}|",
                self.graph[current].points.len()
            )?;
        }

        match opcode {
            Opcode::Start => {
                let first = self.graph[current].all_connections().next();
                match first {
                    Some((path, target)) => state.move_to(path, target),
                    None => self.dead_end(state)?,
                }
            }
            Opcode::End => {
                writeln!(self.output)?;
                writeln!(self.output, "{FINISHED}")?;
                state.halted = Some(Halt::Finished);
            }
            Opcode::Control => self.control(state)?,
            _ => {
                self.execute(opcode, state)?;
                self.default_next(state)?;
            }
        }

        if self.config.verbose {
            writeln!(self.output, "|global stack: {}|", format_stack(&state.stack))?;
            if state.halted.is_none() {
                writeln!(self.output, "{SEPARATOR}")?;
            }
        }
        state.steps += 1;
        Ok(())
    }

    fn dead_end(&mut self, state: &mut MachineState) -> Result<()> {
        writeln!(self.output, "{DEAD_END}")?;
        state.halted = Some(Halt::DeadEnd);
        Ok(())
    }

    fn default_next(&mut self, state: &mut MachineState) -> Result<()> {
        match self.graph[state.current].default_next(state.from_point) {
            Some((path, target)) => state.move_to(path, target),
            None => self.dead_end(state)?,
        }
        Ok(())
    }

    /// Route by the popped value: targets holding an equal value win, then
    /// targets holding nothing, nearest entry first. The arrival path is
    /// never taken.
    fn control(&mut self, state: &mut MachineState) -> Result<()> {
        let wanted = state.pop();
        let shape = &self.graph[state.current];
        let candidates: Vec<(PathId, Target, Option<Value>)> = shape
            .all_connections()
            .filter(|&(path, _)| Some(path) != state.from_key)
            .map(|(path, target)| (path, target, self.graph.value_of(target.shape)))
            .collect();

        let same = |held: &Option<Value>, wanted: &Option<Value>| match (held, wanted) {
            (Some(h), Some(w)) => h.loose_eq(w),
            (None, None) => true,
            _ => false,
        };

        let mut matches: Vec<(PathId, Target)> = candidates
            .iter()
            .filter(|(_, _, held)| same(held, &wanted))
            .map(|&(path, target, _)| (path, target))
            .collect();
        if matches.is_empty() {
            matches = candidates
                .iter()
                .filter(|(_, _, held)| held.is_none())
                .map(|&(path, target, _)| (path, target))
                .collect();
        }

        let mut nearest: Option<(f64, PathId, Target)> = None;
        for (path, target) in matches {
            let d = distance(shape.center, target.entry);
            if nearest.is_none_or(|(best, _, _)| d < best) {
                nearest = Some((d, path, target));
            }
        }

        match nearest {
            Some((_, path, target)) => state.move_to(path, target),
            None => {
                writeln!(self.output)?;
                self.dead_end(state)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, opcode: Opcode, state: &mut MachineState) -> Result<()> {
        let current = state.current;
        match opcode {
            Opcode::Number => {
                let value = Value::Int(self.graph.hole_count(current) as i64);
                if self.config.verbose {
                    writeln!(self.output, "|number shape value: {value}|")?;
                }
                state.stack.push(value);
            }
            Opcode::Pop => {
                state.pop();
            }
            Opcode::Dupe => {
                if let Some(top) = state.stack.last().cloned() {
                    state.stack.push(top);
                }
            }
            Opcode::NumberCheck => {
                if let Some(v) = state.pop() {
                    state.stack.push(Value::Int(i64::from(v.is_numeric())));
                }
            }
            Opcode::ToString => {
                if let Some(v) = state.pop() {
                    state.stack.push(Value::Str(v.to_string()));
                }
            }
            Opcode::ToChar => {
                if let Some(v) = state.pop() {
                    to_char(v, &mut state.stack);
                }
            }
            Opcode::ChrToNum => {
                if let Some(v) = state.pop() {
                    state.stack.push(chr_to_num(v));
                }
            }
            Opcode::ToNumber => {
                if let Some(v) = state.pop() {
                    state.stack.push(v.to_number().unwrap_or(v));
                }
            }
            Opcode::Length => {
                if !state.stack.is_empty() {
                    state.stack.push(Value::Int(state.stack.len() as i64));
                }
            }
            Opcode::Not => {
                if let Some(v) = state.pop() {
                    state.stack.push(Value::Int(i64::from(!v.is_truthy())));
                }
            }
            Opcode::And | Opcode::Or | Opcode::Equals | Opcode::Larger | Opcode::Smaller => {
                if let Some((a, b)) = state.pop_pair() {
                    if a.compatible(&b) {
                        state.stack.push(logic(opcode, a, b));
                    } else {
                        state.push_back(a, b);
                    }
                }
            }
            Opcode::Oper => {
                if let Some((a, b)) = state.pop_pair() {
                    let code = self.graph.hole_count(current);
                    if self.config.verbose {
                        writeln!(self.output, "|operation shape code: {code}|")?;
                    }
                    oper(code, a, b, state);
                }
            }
            Opcode::Container => {
                let slot = std::mem::take(&mut self.graph[current].value);
                match slot {
                    Slot::Held(v) => state.stack.push(v),
                    other => {
                        self.graph[current].value = match state.pop() {
                            Some(v) => Slot::Held(v),
                            None => other,
                        };
                    }
                }
            }
            Opcode::Stack => self.local_stack(state)?,
            Opcode::In => {
                write!(self.output, "<<< ")?;
                self.output.flush()?;
                let mut line = String::new();
                self.input.read_line(&mut line)?;
                let line = line.strip_suffix('\n').unwrap_or(&line);
                let line = line.strip_suffix('\r').unwrap_or(line);
                state.stack.push(Value::parse_input(line));
            }
            Opcode::Out => {
                match state.pop() {
                    Some(v) => writeln!(self.output, "{v}")?,
                    None => writeln!(self.output)?,
                }
                self.output.flush()?;
            }
            Opcode::OutNoLf => {
                if let Some(v) = state.pop() {
                    write!(self.output, "{v}")?;
                    self.output.flush()?;
                }
            }
            Opcode::Read => {
                if let Some(v) = state.pop() {
                    let value = self.read_file(&v.to_string())?;
                    state.stack.push(value);
                }
            }
            Opcode::Junction | Opcode::Any => {}
            Opcode::Start | Opcode::End | Opcode::Control => {}
        }
        Ok(())
    }

    fn local_stack(&mut self, state: &mut MachineState) -> Result<()> {
        let current = state.current;
        if self.config.verbose {
            let shown = match &self.graph[current].value {
                Slot::Stack(local) => format_stack(local),
                Slot::Held(v) => v.repr(),
                Slot::Empty => "None".to_string(),
            };
            writeln!(self.output, "|current local stack: {shown}|")?;
        }

        let Some((top, bottom)) = state.pop_pair() else {
            return Ok(());
        };
        let slot = &mut self.graph[current].value;
        if !matches!(slot, Slot::Stack(_)) {
            *slot = Slot::Stack(Vec::new());
        }
        let Slot::Stack(local) = slot else {
            return Ok(());
        };

        if top.loose_eq(&Value::Int(1)) {
            local.push(bottom);
        } else if top.loose_eq(&Value::Int(2)) {
            state.stack.push(bottom);
            state.stack.push(Value::Int(local.len() as i64));
        } else if top.loose_eq(&Value::Int(0)) {
            state.stack.push(bottom);
            if let Some(v) = local.pop() {
                state.stack.push(v);
            }
        } else {
            state.stack.push(bottom);
            state.stack.push(top);
        }
        Ok(())
    }

    /// Contents of a text file; 0 when missing, 1 when not UTF-8 and 2 for any
    /// other failure.
    fn read_file(&mut self, path: &str) -> Result<Value> {
        let resolved = match &self.config.home_dir {
            Some(home) => home.join(path),
            None => PathBuf::from(path),
        };
        Ok(match std::fs::read_to_string(&resolved) {
            Ok(text) => Value::Str(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Int(0),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Value::Int(1),
            Err(e) => {
                if self.config.verbose {
                    writeln!(
                        self.output,
                        "|encountered unhandled exception while reading file: {e}|"
                    )?;
                }
                Value::Int(2)
            }
        })
    }
}

fn find_start(graph: &ShapeGraph) -> Result<ShapeId> {
    let starts: Vec<ShapeId> = graph
        .top_level()
        .filter(|&id| graph.opcode(id) == Opcode::Start)
        .collect();

    let start = match starts.as_slice() {
        [] => return Err(ShapesError::NoStart),
        [start] => *start,
        many => return Err(ShapesError::MultipleStarts(many.len())),
    };

    let connecteds = &graph[start].connecteds;
    match connecteds.values().next() {
        None => Err(ShapesError::StartDisconnected),
        Some(conn) if connecteds.len() > 1 || conn.targets.len() > 1 => {
            Err(ShapesError::StartFanOut)
        }
        Some(_) => Ok(start),
    }
}

fn to_char(v: Value, stack: &mut Vec<Value>) {
    match v {
        Value::Int(_) | Value::Float(_) => {
            let code = match v {
                Value::Int(i) => u32::try_from(i).ok(),
                Value::Float(f) if f.is_finite() && f >= 0.0 => u32::try_from(f.trunc() as i64).ok(),
                _ => None,
            };
            match code.and_then(char::from_u32) {
                Some(c) => stack.push(Value::Char(c)),
                None => stack.push(v),
            }
        }
        Value::Str(s) => stack.extend(s.chars().rev().map(Value::Char)),
        Value::Char(_) => stack.push(v),
    }
}

fn chr_to_num(v: Value) -> Value {
    let single = match &v {
        Value::Char(c) => Some(*c),
        Value::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
        Value::Int(_) | Value::Float(_) => None,
    };
    match single {
        Some(c) => Value::Int(i64::from(u32::from(c))),
        None => v,
    }
}

fn logic(opcode: Opcode, a: Value, b: Value) -> Value {
    let flag = |set: bool| Value::Int(i64::from(set));
    match opcode {
        Opcode::Or => {
            if a.is_truthy() { a } else { b }
        }
        Opcode::And => {
            if a.is_truthy() { b } else { a }
        }
        Opcode::Equals => flag(a.loose_eq(&b)),
        Opcode::Larger => flag(a.compare(&b) == Some(std::cmp::Ordering::Greater)),
        Opcode::Smaller => flag(a.compare(&b) == Some(std::cmp::Ordering::Less)),
        _ => b,
    }
}

/// Arithmetic selected by the hole count of an operator shape.
fn oper(code: usize, a: Value, b: Value, state: &mut MachineState) {
    let result = match code {
        1 if a.compatible(&b) => a.add(&b),
        2 if a.is_numeric() && b.is_numeric() => a.sub(&b),
        3 if a.is_numeric() && b.is_numeric() => a.mul(&b),
        4 if a.is_numeric() && b.is_numeric() => a.div(&b),
        5 if a.is_numeric() && b.is_numeric() => a.rem(&b),
        1..=5 => None,
        6 => Some(Value::Str(format!("{a}{b}"))),
        _ => {
            state.stack.push(a);
            state.stack.push(b);
            return;
        }
    };
    match result {
        Some(v) => state.stack.push(v),
        None => state.push_back(a, b),
    }
}
