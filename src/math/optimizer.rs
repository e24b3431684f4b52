// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Guiding traits to implement iterative optimization algorithms.

/// Enum used to indicate if iterations should continue or stop.
/// Must be returned by the `stop_criterion` function.
pub enum Continue {
    /// Stop iterations.
    Stop,
    /// Continue iterations.
    Forward,
}

/// A `State<Observations, EvalState, Model, Error>`
/// is capable of iteratively minimizing an energy function,
/// if provided few functions that are evaluated during iterations.
///
/// It is merely a skeleton for any iterative optimizer.
/// Here is a simple description of its generic types.
///
/// * `Observations`: the data used as reference during energy evaluations.
/// * `EvalState`: result of the evaluation of a model.
///   It can short-circuit the computation of everything needed in the full state
///   in cases where we know that we are going to backtrack.
/// * `Model`: The model of what you are trying to optimize.
/// * `Error`: reason why a step could not be computed.
pub trait State<Observations, EvalState, Model, Error>
where
    Self: Sized,
{
    /// Initialize the optimizer state.
    fn init(obs: &Observations, model: Model) -> Self;

    /// Computes the iteration step from the current optimizer state.
    /// May fail, in which case iterations are stopped
    /// and `iterative_solve` also returns the error.
    fn step(&self) -> Result<Model, Error>;

    /// Evaluates the model.
    fn eval(&self, obs: &Observations, new_model: Model) -> EvalState;

    /// Function deciding if iterations should continue.
    /// Also returns the state that will be used for next iteration, or returned if we stop.
    fn stop_criterion(self, nb_iter: usize, eval_state: EvalState) -> (Self, Continue);

    /// Iteratively solve your optimization problem,
    /// with the provided functions by the trait implementation.
    /// Returns the final state and the number of iterations.
    fn iterative_solve(obs: &Observations, initial_model: Model) -> Result<(Self, usize), Error> {
        let mut state = Self::init(obs, initial_model);
        let mut nb_iter = 0;
        loop {
            nb_iter += 1;
            let new_model = state.step()?;
            let eval_state = state.eval(obs, new_model);
            let (kept_state, continuation) = state.stop_criterion(nb_iter, eval_state);
            state = kept_state;
            if let Continue::Stop = continuation {
                return Ok((state, nb_iter));
            }
        }
    }
}
