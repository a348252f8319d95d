mod foundation_api;
mod vm_api;
mod volume_group_api;
mod vpc_api;

// -----------------------------------------------------------------------------

mod helpers;
