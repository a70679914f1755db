use leptos::prelude::*;
use tsprep_core::{WorkflowProgress, WorkflowStep};

/// The six-step workflow indicator. Classes follow `progress`.
#[component]
pub fn StepList(progress: RwSignal<WorkflowProgress>) -> impl IntoView {
    view! {
        <ol class="steps">
            {WorkflowStep::ALL
                .into_iter()
                .map(|step| {
                    let class = move || {
                        let p = progress.get();
                        if p.active() == Some(step) {
                            "step step-active"
                        } else if p.is_done(step) {
                            "step step-done"
                        } else {
                            "step"
                        }
                    };
                    view! {
                        <li class=class>
                            <span class="step-index">{step.index() + 1}</span>
                            <span class="step-label">{step.label()}</span>
                        </li>
                    }
                })
                .collect_view()}
        </ol>
    }
}
