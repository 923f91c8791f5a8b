mod archive;
mod plan_handoff;
