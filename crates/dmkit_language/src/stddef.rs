//! The builtin library loaded before the environment.
//!
//! It declares the engine's base types and their default variable values,
//! and the standard constants as macros.

/// Name the builtin library is lexed under.
pub const STDDEF_FILE: &str = "stddef.dm";

/// Source of the builtin library.
pub const STDDEF: &str = r#"
#define TRUE 1
#define FALSE 0

#define NORTH 1
#define SOUTH 2
#define EAST 4
#define WEST 8
#define NORTHEAST 5
#define NORTHWEST 9
#define SOUTHEAST 6
#define SOUTHWEST 10
#define UP 16
#define DOWN 32

#define MALE "male"
#define FEMALE "female"
#define NEUTER "neuter"
#define PLURAL "plural"

#define AREA_LAYER 1
#define TURF_LAYER 2
#define OBJ_LAYER 3
#define MOB_LAYER 4
#define FLY_LAYER 5
#define EFFECTS_LAYER 5000
#define TOPDOWN_LAYER 10000
#define BACKGROUND_LAYER 20000
#define FLOAT_LAYER -1
#define FLOAT_PLANE -32767

#define BLEND_DEFAULT 0
#define BLEND_OVERLAY 1
#define BLEND_ADD 2
#define BLEND_SUBTRACT 3
#define BLEND_MULTIPLY 4
#define BLEND_INSET_OVERLAY 5

#define LONG_GLIDE 1
#define RESET_COLOR 2
#define RESET_ALPHA 4
#define RESET_TRANSFORM 8
#define NO_CLIENT_COLOR 16
#define KEEP_TOGETHER 32
#define KEEP_APART 64
#define PLANE_MASTER 128
#define TILE_BOUND 256
#define PIXEL_SCALE 512
#define PASS_MOUSE 1024

#define NO_STEPS 0
#define FORWARD_STEPS 1
#define SLIDE_STEPS 2
#define SYNC_STEPS 3

#define SEE_INFRA 64
#define SEE_SELF 32
#define SEE_MOBS 4
#define SEE_OBJS 8
#define SEE_TURFS 16
#define SEE_PIXELS 256
#define SEE_THRU 512
#define SEE_BLACKNESS 1024
#define BLIND 1

#define MOUSE_INACTIVE_POINTER 0
#define MOUSE_ACTIVE_POINTER 1
#define MOUSE_DRAG_POINTER 3
#define MOUSE_DROP_POINTER 4
#define MOUSE_ARROW_POINTER 5
#define MOUSE_CROSSED_POINTER 6
#define MOUSE_HAND_POINTER 7

#define ICON_ADD 0
#define ICON_SUBTRACT 1
#define ICON_MULTIPLY 2
#define ICON_OVERLAY 3
#define ICON_AND 4
#define ICON_OR 5
#define ICON_UNDERLAY 6

#define MS_WINDOWS 1
#define UNIX 0

/datum
	var/const/type
	var/const/parent_type
	var/tag
	var/const/vars

/atom
	parent_type = /datum
	var/alpha = 255
	var/appearance_flags = 0
	var/blend_mode = 0
	var/color
	var/density = 0
	var/desc
	var/dir = SOUTH
	var/gender = NEUTER
	var/icon
	var/icon_state
	var/infra_luminosity = 0
	var/invisibility = 0
	var/layer = 1
	var/luminosity = 0
	var/maptext
	var/maptext_width = 32
	var/maptext_height = 32
	var/maptext_x = 0
	var/maptext_y = 0
	var/mouse_over_pointer = MOUSE_INACTIVE_POINTER
	var/mouse_drag_pointer = MOUSE_INACTIVE_POINTER
	var/mouse_drop_pointer = MOUSE_DROP_POINTER
	var/mouse_drop_zone = 0
	var/mouse_opacity = 1
	var/name
	var/opacity = 0
	var/overlays
	var/pixel_x = 0
	var/pixel_y = 0
	var/pixel_w = 0
	var/pixel_z = 0
	var/plane = FLOAT_PLANE
	var/render_source
	var/render_target
	var/suffix
	var/text
	var/transform
	var/underlays
	var/verbs
	var/const/x = 0
	var/const/y = 0
	var/const/z = 0

/atom/movable
	layer = OBJ_LAYER
	var/animate_movement = FORWARD_STEPS
	var/bound_x = 0
	var/bound_y = 0
	var/bound_width = 32
	var/bound_height = 32
	var/glide_size = 0
	var/screen_loc
	var/step_size = 32
	var/step_x = 0
	var/step_y = 0

/area
	parent_type = /atom
	layer = AREA_LAYER
	luminosity = 1

/turf
	parent_type = /atom
	layer = TURF_LAYER

/obj
	parent_type = /atom/movable
	layer = OBJ_LAYER

/mob
	parent_type = /atom/movable
	layer = MOB_LAYER
	var/ckey
	var/key
	var/see_in_dark = 2
	var/see_infrared = 0
	var/see_invisible = 0
	var/sight = 0

/image
	parent_type = /datum
	var/alpha = 255
	var/color
	var/dir = SOUTH
	var/icon
	var/icon_state
	var/layer = FLOAT_LAYER
	var/pixel_x = 0
	var/pixel_y = 0
	var/plane = FLOAT_PLANE

/list
	parent_type = /datum

/world
	var/area = /area
	var/turf = /turf
	var/mob = /mob
	var/name = "byond"
	var/view = 5
	var/fps = 10
	var/icon_size = 32
	var/maxx = 0
	var/maxy = 0
	var/maxz = 0
"#;
